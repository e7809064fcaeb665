//! Unattended propose-then-build loop.
//!
//! Keeps `target.md` and `current.md` in the working directory, asks the
//! reasoning service for one small increment per iteration, and writes the
//! result to disk until interrupted with Ctrl+C.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use buildloop::exit_codes;
use buildloop::io::config::{CONFIG_FILE_NAME, LoopConfig, load_config};
use buildloop::io::gateway::AnthropicGateway;
use buildloop::logging;
use buildloop::looping::{IterationReport, LoopController};
use buildloop::stop::{StopHandle, stop_channel};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "buildloop",
    version,
    about = "Unattended propose-then-build loop (Ctrl+C to stop)"
)]
struct Cli {
    /// Directory holding the state documents and generated files.
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Config file, relative to the working directory. Missing means defaults.
    #[arg(long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let code = match run(Cli::parse()).await {
        Ok(()) => exit_codes::STOPPED,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    logging::init()?;
    let config = load_config(&cli.workdir.join(&cli.config))?;
    let api_key = read_api_key(&config)?;
    let gateway = AnthropicGateway::new(&config, api_key)?;

    let (handle, signal) = stop_channel();
    spawn_interrupt_listener(handle);

    let pause_secs = config.pause_secs;
    let mut controller = LoopController::new(&cli.workdir, config, gateway, signal)?;
    info!(workdir = %cli.workdir.display(), "starting loop");
    println!("Starting loop in {}", cli.workdir.display());

    let outcome = controller
        .run(|report| print_report(report, pause_secs))
        .await?;

    println!(
        "\nStopped after {} iteration(s), {} applied. Check your files!",
        outcome.iterations, outcome.actions_applied
    );
    Ok(())
}

fn read_api_key(config: &LoopConfig) -> Result<String> {
    let name = &config.api.api_key_env;
    let key = std::env::var(name).with_context(|| format!("set the {name} environment variable"))?;
    if key.trim().is_empty() {
        return Err(anyhow!("{name} is empty"));
    }
    Ok(key)
}

/// Raise the stop on Ctrl+C. The loop only acts on it at its next pause, so a
/// second Ctrl+C exits at once in case a gateway call hangs.
fn spawn_interrupt_listener(handle: StopHandle) {
    tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, &handle).await == InterruptEnd::Forced {
            eprintln!("\nSecond interrupt; exiting without waiting for the iteration.");
            std::process::exit(exit_codes::FAILED);
        }
    });
}

#[derive(Debug, PartialEq, Eq)]
enum InterruptEnd {
    /// A second interrupt arrived after the stop was raised.
    Forced,
    /// Listening for interrupts failed.
    ListenerFailed,
}

async fn forward_interrupts<I, Fut>(mut next_interrupt: I, handle: &StopHandle) -> InterruptEnd
where
    I: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(err) = next_interrupt().await {
        warn!(err = %err, "failed to listen for ctrl-c");
        return InterruptEnd::ListenerFailed;
    }
    println!("\nStop requested; finishing the current iteration (Ctrl+C again to quit now)...");
    handle.stop();
    match next_interrupt().await {
        Ok(()) => InterruptEnd::Forced,
        Err(err) => {
            warn!(err = %err, "failed to listen for ctrl-c");
            InterruptEnd::ListenerFailed
        }
    }
}

fn print_report(report: &IterationReport, pause_secs: u64) {
    println!("\n{}", "=".repeat(50));
    println!("ITERATION {}", report.iteration);
    println!("{}", "=".repeat(50));
    println!("\nNext step: {}", report.plan_preview);
    println!("\nResult: {}", report.outcome.summary());
    println!(
        "\nDone in {:.1}s. Ctrl+C to stop, or wait {pause_secs}s for the next iteration...",
        report.duration.as_secs_f64()
    );
}
