use anyhow::Context as _;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use stampede_core::http::HttpClient;
use stampede_core::{RunContext, RunSummary, Scenario, ScenarioConfig, ThresholdSet};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::scenario_yaml::{self, ScenarioYaml};
use crate::scenarios::{self, Workload};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let workload = scenarios::find(&args.scenario).ok_or_else(|| {
        RunError::InvalidInput(anyhow::anyhow!(
            "unknown scenario `{}` (available: {}; see `stampede list`)",
            args.scenario,
            scenarios::names().join(", ")
        ))
    })?;

    let file = match &args.config {
        Some(path) => scenario_yaml::load(path)
            .await
            .map_err(RunError::InvalidInput)?,
        None => ScenarioYaml::default(),
    };

    let config = scenario_config(workload, &args, &file)?;
    check_base_url(&args.base_url)?;
    let thresholds = threshold_sets(workload, &file)?;

    let ctx = Arc::new(
        RunContext::new(HttpClient::default(), &args.base_url).map_err(RunError::from_core)?,
    );
    let exec = workload.build(&ctx).map_err(RunError::from_core)?;

    for set in thresholds
        .iter()
        .filter(|set| !ctx.registry().contains(&set.metric))
    {
        tracing::warn!(
            metric = %set.metric,
            scenario = workload.name(),
            "threshold on a metric this scenario never records; it will be reported unmet"
        );
    }

    tracing::debug!(
        scenario = workload.name(),
        executor = %config.executor.kind(),
        vus_max = config.executor.max_vus(),
        thresholds = thresholds.len(),
        "scenario configured"
    );

    let out = output::formatter(args.output);
    out.print_header(ctx.base_url(), std::slice::from_ref(&config));

    let summary = stampede_core::run_scenarios(
        ctx,
        vec![Scenario::new(config, exec)],
        &thresholds,
        out.progress(),
    )
    .await
    .map_err(RunError::from_core)?;

    out.print_summary(&summary).map_err(RunError::RuntimeError)?;
    out.print_report(&workload.report(&summary));

    if let Some(path) = &args.summary_export {
        export_summary(path, &summary)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    Ok(ExitCode::from_thresholds(summary.passed))
}

pub fn list() {
    let width = scenarios::names()
        .iter()
        .map(|n| n.len())
        .max()
        .unwrap_or(0);

    for w in scenarios::all() {
        let profile = w
            .profile()
            .map_or_else(|| "custom".to_string(), |p| p.to_string());
        println!("{:<width$}  {:<12}  {}", w.name(), profile, w.about());
    }
}

/// Profile (or the workload's own executor), then the config file, then CLI flags.
fn scenario_config(
    workload: &dyn Workload,
    args: &RunArgs,
    file: &ScenarioYaml,
) -> Result<ScenarioConfig, RunError> {
    let executor = match args.profile {
        Some(profile) => profile.executor(),
        None => workload.default_executor(),
    };

    let config = file
        .apply(ScenarioConfig::new(workload.name(), executor))
        .map_err(RunError::InvalidInput)?
        .with_overrides(&args.run_config());

    config.validate().map_err(RunError::from_core)?;
    Ok(config)
}

fn check_base_url(raw: &str) -> Result<(), RunError> {
    let url = url_scheme(raw);
    match url {
        Some("http" | "https") => Ok(()),
        _ => Err(RunError::InvalidInput(anyhow::anyhow!(
            "invalid --base-url `{raw}` (expected http:// or https://)"
        ))),
    }
}

fn url_scheme(raw: &str) -> Option<&str> {
    let (scheme, rest) = raw.split_once("://")?;
    (!rest.is_empty()).then_some(scheme)
}

/// Built-in thresholds, with the config file's entries replacing a metric's set.
fn threshold_sets(
    workload: &dyn Workload,
    file: &ScenarioYaml,
) -> Result<Vec<ThresholdSet>, RunError> {
    let mut merged: BTreeMap<String, Vec<String>> = workload
        .thresholds()
        .into_iter()
        .map(|(metric, exprs)| {
            (
                metric.to_string(),
                exprs.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

    for (metric, exprs) in file.threshold_overrides() {
        if exprs.is_empty() {
            return Err(RunError::InvalidInput(anyhow::anyhow!(
                "thresholds for `{metric}` must not be empty"
            )));
        }
        merged.insert(metric, exprs);
    }

    merged
        .into_iter()
        .map(|(metric, exprs)| ThresholdSet::parse(metric, &exprs).map_err(RunError::from_core))
        .collect()
}

async fn export_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(summary).context("failed to encode summary")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create summary export dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write summary export: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser as _;
    use stampede_core::ScenarioExecutor;

    use super::*;
    use crate::cli::{Cli, Command};

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["stampede", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full) {
            Ok(Cli {
                command: Command::Run(args),
            }) => args,
            Ok(_) => panic!("expected run command"),
            Err(err) => panic!("failed to parse args: {err}"),
        }
    }

    fn yaml(raw: &str) -> ScenarioYaml {
        scenario_yaml::parse(raw.as_bytes()).unwrap_or_else(|e| panic!("{e:#}"))
    }

    fn workload(name: &str) -> &'static dyn Workload {
        scenarios::find(name).unwrap_or_else(|| panic!("missing workload {name}"))
    }

    #[test]
    fn cli_flags_win_over_file_and_profile() {
        let args = run_args(&["coupon-issue", "--vus", "7"]);
        let file = yaml("vus: 50\niterations: 200\n");
        let cfg = scenario_config(workload("coupon-issue"), &args, &file)
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(
            cfg.executor,
            ScenarioExecutor::SharedIterations {
                vus: 7,
                iterations: 200,
                max_duration: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn profile_replaces_the_default_executor() {
        let args = run_args(&["order-create", "--profile", "smoke"]);
        let cfg = scenario_config(workload("order-create"), &args, &ScenarioYaml::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cfg.executor.max_vus(), 1);
        assert_eq!(cfg.name, "order-create");
    }

    #[test]
    fn zero_vus_is_invalid_input() {
        let args = run_args(&["smoke", "--vus", "0"]);
        let err = scenario_config(workload("smoke"), &args, &ScenarioYaml::default());
        assert!(matches!(err, Err(RunError::InvalidInput(_))));
    }

    #[test]
    fn file_thresholds_replace_a_metric_set() {
        let file = yaml("thresholds:\n  http_req_duration: [\"p(99)<800\", \"avg<100\"]\n");
        let sets = threshold_sets(workload("coupon-issue"), &file).unwrap_or_else(|e| panic!("{e}"));

        let duration = sets
            .iter()
            .find(|s| s.metric == "http_req_duration")
            .unwrap_or_else(|| panic!("missing http_req_duration"));
        let sources: Vec<&str> = duration.expressions.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, ["p(99)<800", "avg<100"]);

        assert!(sets.iter().any(|s| s.metric == "successful_coupon_issues"));
    }

    #[test]
    fn malformed_threshold_is_invalid_input() {
        let file = yaml("thresholds:\n  checks: \"rate>>1\"\n");
        assert!(matches!(
            threshold_sets(workload("smoke"), &file),
            Err(RunError::InvalidInput(_))
        ));

        let empty = yaml("thresholds:\n  checks: []\n");
        assert!(matches!(
            threshold_sets(workload("smoke"), &empty),
            Err(RunError::InvalidInput(_))
        ));
    }

    #[test]
    fn base_url_needs_an_http_scheme() {
        assert!(check_base_url("http://localhost:8080").is_ok());
        assert!(check_base_url("https://shop.example").is_ok());
        assert!(check_base_url("localhost:8080").is_err());
        assert!(check_base_url("ftp://host").is_err());
        assert!(check_base_url("http://").is_err());
    }
}
