mod cli;
mod exit_codes;
mod logging;
mod output;
mod profiles;
mod run;
mod run_error;
mod scenario_yaml;
mod scenarios;

use clap::Parser;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit_codes::ExitCode::Success.as_i32()
                }
                _ => exit_codes::ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    let code = match cli.command {
        cli::Command::Run(args) => {
            if let Err(err) = logging::init(args.log_level.as_deref()) {
                eprintln!("{err:#}");
                std::process::exit(exit_codes::ExitCode::InvalidInput.as_i32());
            }

            match run::run(args).await {
                Ok(code) => code.as_i32(),
                Err(err) => {
                    eprintln!("{err}");
                    err.exit_code().as_i32()
                }
            }
        }
        cli::Command::List => {
            run::list();
            exit_codes::ExitCode::Success.as_i32()
        }
    };

    std::process::exit(code);
}
