use anyhow::Context;
use clap::Parser;
use dailyflow::{
    Cli, DailyFlow, DailyFlowError, OutputFormatter, OutputMode, RunDate, UserFriendlyError,
};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli) {
        eprintln!("Warning: {:#}", e);
    }

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let date = match cli.run_date() {
        Ok(date) => date,
        Err(e) => {
            print_startup_error(&cli, &e);
            return e.exit_code();
        }
    };

    let dailyflow = match DailyFlow::from_cli(&cli) {
        Ok(dailyflow) => dailyflow,
        Err(e) => {
            print_startup_error(&cli, &e);
            return e.exit_code();
        }
    };

    if cli.dry_run {
        return handle_dry_run(&dailyflow, &date);
    }

    match dailyflow.run(&date, cli.run_mode()).await {
        Ok(report) => {
            dailyflow.output_formatter().print_run_report(&report);
            0
        }
        Err(e) => {
            dailyflow.handle_error(&e);
            e.exit_code()
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "dailyflow.toml".to_string());

    match DailyFlow::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  dailyflow --config {}", config_path);
            println!("\nSet `root` under [paths] to the directory holding data/.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(dailyflow: &DailyFlow, date: &RunDate) -> i32 {
    let formatter = dailyflow.output_formatter();

    formatter.info("DRY RUN MODE - nothing will be created or executed");

    match dailyflow.plan(date) {
        Ok((plan, directories)) => {
            formatter.print_plan(&plan, &directories);
            formatter.print_separator();
            formatter.success("Dry run completed successfully");
            0
        }
        Err(e) => {
            dailyflow.handle_error(&e);
            e.exit_code()
        }
    }
}

fn print_startup_error(cli: &Cli, error: &DailyFlowError) {
    let formatter = OutputFormatter::new(OutputMode::from(&cli.output_format), 0, false);
    formatter.print_user_friendly_error(error);
}

fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp_secs()
        .try_init()
        .context("failed to initialise logging")
}
