use crate::error::{DailyFlowError, UserFriendlyError};
use crate::layout::ProvisionReport;
use crate::pipeline::{PipelinePlan, RunReport};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    // Core messaging methods
    pub fn success(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Success, message),
                OutputMode::Json => self.print_json_message("success", message),
                OutputMode::Plain => println!("SUCCESS: {}", message),
            }
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &DailyFlowError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    /// One line per provisioned directory.
    pub fn print_provision_report(&self, report: &ProvisionReport) {
        for directory in &report.directories {
            self.success(&directory.describe());
        }
        self.info(&format!(
            "{} of {} director{} created",
            report.created_count(),
            report.directories.len(),
            if report.directories.len() == 1 { "y" } else { "ies" }
        ));
    }

    pub fn print_sources(&self, sources: &[String]) {
        if sources.is_empty() {
            self.warning("No data sources found; no extraction branches will run");
            return;
        }
        self.success(&format!("Found {} data source(s)", sources.len()));
        for source in sources {
            self.info(&format!("  {}", source));
        }
    }

    /// What a run would do, without doing it.
    pub fn print_plan(&self, plan: &PipelinePlan, directories: &[PathBuf]) {
        match self.mode {
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "plan",
                    "directories": directories,
                    "plan": plan,
                }));
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_header(&format!("Plan for {}", plan.date));

                println!("Directories:");
                for directory in directories {
                    println!("  {}", directory.display());
                }
                println!();

                println!("Source branches ({}):", plan.branches.len());
                for branch in &plan.branches {
                    println!("  {}", branch.source);
                    for step in &branch.steps {
                        println!("    [{}] {}", step.id, step.command);
                    }
                }
                println!();

                println!("Manifest: {}", plan.manifest_path.display());
                for entry in plan.manifest_entries() {
                    println!("  {} -> {}", entry.entity, entry.path);
                }
                println!();

                println!("Consolidation:");
                for step in &plan.closing {
                    println!("  [{}] {}", step.id, step.command);
                }
                println!();
                println!("Tool invocations: {}", plan.step_count());

                for warning in &plan.warnings {
                    self.warning(warning);
                }
            }
        }
    }

    pub fn print_run_report(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Human => self.print_human_report(report),
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_report(&self, report: &RunReport) {
        if self.quiet {
            return;
        }

        println!();
        self.print_separator();

        if self.use_colors {
            println!(
                "{} {}",
                style(format!("Daily cycle for {} completed!", report.date)).green().bold(),
                CHECKMARK
            );
        } else {
            println!("✓ Daily cycle for {} completed!", report.date);
        }

        println!();
        println!(
            "  Directories:     {} ({} new)",
            self.highlight(report.provisioned.len().to_string()),
            report.directories_created()
        );
        println!("  Sources:         {}", self.highlight(report.sources.len().to_string()));
        println!(
            "  Tool runs:       {}",
            self.highlight(report.tool_invocations().to_string())
        );
        if let Some(ref path) = report.manifest_path {
            println!(
                "  Manifest:        {} ({} entries)",
                self.highlight(path.display().to_string()),
                report.manifest_entries
            );
        }
        println!(
            "  Time taken:      {}",
            self.highlight(format_duration(report.duration()))
        );

        let retried: Vec<_> = report
            .branches
            .iter()
            .filter(|b| b.retried())
            .map(|b| b.source.as_str())
            .collect();
        if !retried.is_empty() {
            println!("  Retried:         {}", retried.join(", "));
        }
        if !report.warnings.is_empty() {
            println!("  Warnings:        {}", report.warnings.len());
        }

        self.print_separator();
    }

    fn print_plain_report(&self, report: &RunReport) {
        println!("COMPLETED: Daily cycle for {}", report.date);
        println!("Directories: {}", report.provisioned.len());
        println!("Directories created: {}", report.directories_created());
        println!("Sources: {}", report.sources.len());
        println!("Tool runs: {}", report.tool_invocations());
        if let Some(ref path) = report.manifest_path {
            println!("Manifest: {}", path.display());
        }
        println!("Duration: {:?}", report.duration());
        if !report.warnings.is_empty() {
            println!("Warnings: {}", report.warnings.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}
