use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, base_url: &str, scenarios: &[stampede_core::ScenarioConfig]);
    fn progress(&self) -> Option<stampede_core::ProgressFn>;
    fn print_summary(&self, summary: &stampede_core::RunSummary) -> anyhow::Result<()>;
    /// Workload-specific verdict printed after the summary.
    fn print_report(&self, report: &str);
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(human::HumanOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
