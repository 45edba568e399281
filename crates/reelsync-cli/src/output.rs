use clap::ValueEnum;
use media_sync_core::SyncReport;
use media_sync_models::SyncPlan;
use owo_colors::OwoColorize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.message("success", "✓".green().to_string(), msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Human => println!("{}", msg.as_ref()),
            _ => self.print_json(&json!({ "type": "info", "message": msg.as_ref() })),
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.message("warning", "⚠".yellow().to_string(), msg.as_ref());
    }

    /// Always shown, even in quiet mode
    pub fn error(&self, msg: impl AsRef<str>) {
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", "✗".red(), msg.as_ref()),
            _ => self.print_json(&json!({ "type": "error", "message": msg.as_ref() })),
        }
    }

    fn message(&self, kind: &str, marker: String, msg: &str) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Human => println!("{} {}", marker, msg),
            _ => self.print_json(&json!({ "type": kind, "message": msg })),
        }
    }

    pub fn json(&self, data: &serde_json::Value) {
        if self.quiet && self.format != OutputFormat::Human {
            return;
        }
        self.print_json(data);
    }

    fn print_json(&self, data: &serde_json::Value) {
        match self.format {
            OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(data).unwrap_or_default()),
            _ => println!("{}", serde_json::to_string(data).unwrap_or_default()),
        }
    }

    /// One summary line per library kind, plus the plans of a dry run.
    pub fn sync_report(&self, report: &SyncReport) {
        if !self.is_human() {
            match serde_json::to_value(report) {
                Ok(value) => self.json(&value),
                Err(e) => self.error(format!("Failed to serialize sync report: {}", e)),
            }
            return;
        }

        if report.rejected {
            self.warn(format!("{}: a sync is already running, skipped", report.kind));
            return;
        }

        for plan in &report.plans {
            self.plan(report, plan);
        }

        let summary = format!(
            "{}: {} pushed, {} pulled, {} removed, {} skipped in {:.1}s",
            report.kind,
            report.pushed,
            report.pulled,
            report.removed,
            report.skipped,
            report.duration.as_secs_f64()
        );
        if report.dry_run {
            self.info(format!("{} (dry run, nothing applied)", report.kind));
        } else if report.has_failures() {
            self.warn(format!("{}, {} failed", summary, report.failed));
            for error in &report.errors {
                self.error(format!("  {}", error));
            }
        } else if report.stopped {
            self.warn(format!("{} (stopped early)", summary));
        } else {
            self.success(summary);
        }
    }

    fn plan(&self, report: &SyncReport, plan: &SyncPlan) {
        if plan.is_empty() {
            self.info(format!("{} {}: up to date", report.kind, plan.facet));
            return;
        }
        self.info(format!(
            "{} {}: {} to push, {} to pull, {} to remove",
            report.kind.bold(),
            plan.facet.bold(),
            plan.to_push_remote.len(),
            plan.to_pull_local.len(),
            plan.to_remove_remote.len()
        ));
        let lines = [
            ("+", &plan.to_push_remote),
            ("<", &plan.to_pull_local),
            ("-", &plan.to_remove_remote),
        ];
        for (marker, records) in lines {
            for record in records {
                self.info(format!("    {} {}", marker, record.label()));
            }
        }
    }
}
