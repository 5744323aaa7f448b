mod checkpoints;
mod config;
mod errors;
mod journey;
mod locator;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use checkpoints::{Checkpointer, FsCheckpointer};
use config::Config;
use journey::steps::storefront_journey;
use journey::{JourneyExecutor, RunResult};
use locator::Resolver;
use session::webdriver::WebDriverSession;
use session::DriverSession;

#[derive(Parser)]
#[command(name = "journey-runner")]
#[command(about = "Drives the storefront ordering journey end to end", long_about = None)]
struct Cli {
    /// WebDriver endpoint the browser session is created against
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Directory visual checkpoints are written to
    #[arg(long, env = "SCREENSHOT_DIR", default_value = "screenshots")]
    screenshot_dir: PathBuf,

    /// Path to write the run report to (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds to pause for manual OTP entry
    #[arg(long, default_value_t = 35)]
    otp_wait_secs: u64,

    /// Seconds the browser stays up for review after a failed run
    #[arg(long, default_value_t = 30)]
    grace_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Required configuration is checked before any browser session exists;
    // a missing value terminates with a non-zero status right here.
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ {err}. Set it in the environment (a .env-style export works) and rerun.");
            std::process::exit(1);
        }
    };
    config.otp_wait = Duration::from_secs(cli.otp_wait_secs);

    let session: Arc<dyn DriverSession> = match WebDriverSession::connect(&cli.webdriver_url).await
    {
        Ok(session) => Arc::new(session),
        Err(err) => {
            eprintln!("❌ Failed to create browser session at {}: {err}", cli.webdriver_url);
            std::process::exit(1);
        }
    };

    let checkpointer: Arc<dyn Checkpointer> =
        Arc::new(FsCheckpointer::new(cli.screenshot_dir.clone()));
    let executor = JourneyExecutor::new(session.clone(), Resolver::default(), checkpointer);
    let steps = storefront_journey(&config);

    info!(steps = steps.len(), "▶️  starting journey");
    let result = executor.run(&steps).await;

    if result.success {
        info!("🏁 journey complete, review the final page before closing");
    } else {
        error!(
            step = result.failed_step.as_deref().unwrap_or("unknown"),
            cause = result.cause.as_deref().unwrap_or("unknown"),
            "journey failed"
        );
        info!(
            grace_secs = cli.grace_secs,
            "leaving the browser up so the failure can be inspected"
        );
        tokio::time::sleep(Duration::from_secs(cli.grace_secs)).await;
    }

    print_summary(&result);
    if let Err(err) = emit_report(&result, cli.output.as_deref()) {
        error!(error = %err, "failed to emit report");
    }

    // The operator acknowledges before the browser resource is released, so
    // the final on-screen state can be inspected.
    println!("\nPress Enter to close the browser and exit...");
    let _ = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    })
    .await;

    if let Err(err) = session.quit().await {
        warn!(error = %err, "failed to close browser session");
    }
}

fn print_summary(result: &RunResult) {
    println!(
        "Restaurant Selected: {}",
        result.state.restaurant_name.as_deref().unwrap_or("Unknown")
    );
    println!(
        "Food Item Selected: {}",
        result.state.item_name.as_deref().unwrap_or("Unknown")
    );
    println!("Cart Total: {}", result.state.cart_total.as_deref().unwrap_or(""));
}

fn emit_report(result: &RunResult, output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result).context("serializing run report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            println!("📄 Report saved to: {}", path.display());
        }
        None => println!("\n--- Run Report ---\n{json}"),
    }
    Ok(())
}
