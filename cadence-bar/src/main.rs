mod util;

use std::time::Duration;

use anyhow::{Context, Result};
use cadence_blocks::{ClockBlock, CommandBlock, TextBlock};
use cadence_core::{Color, Runner, RunnerConfig, RunnerError, Signal};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    util::init_tracing();
    util::install_panic_hook();

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            match e.downcast_ref::<RunnerError>() {
                Some(RunnerError::ShutdownTimeout(_)) | Some(RunnerError::Interrupted) => 2,
                _ => 1,
            }
        }
    };

    // tokio's stdin reader sits on a blocking thread that never wakes up on
    // its own, so leave without waiting for the runtime to drop.
    std::process::exit(code);
}

async fn run() -> Result<()> {
    let config = RunnerConfig::from_env().context("reading CADENCE_* settings")?;
    let mut runner = Runner::new(config);
    register_layout(&mut runner)?;

    info!(blocks = runner.registry().len(), "cadence-bar starting");
    runner.run_stdio().await?;
    info!("cadence-bar stopped");
    Ok(())
}

fn register_layout(runner: &mut Runner) -> Result<()> {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1) as f64;

    let load = CommandBlock::new("cut -d' ' -f1-3 /proc/loadavg")
        .every(Duration::from_secs(5))
        .colored([
            (0.0, Color::NEUTRAL),
            (cpus / 2.0, Some(Color::WARN)),
            (cpus, Some(Color::URGENT)),
        ]);

    runner.register(load, [])?;
    runner.register(TextBlock::new("cadence"), [])?;
    // `pkill -USR1 cadence-bar` forces a redraw of the clock.
    runner.register(ClockBlock::default(), [Signal::USR1])?;
    Ok(())
}
