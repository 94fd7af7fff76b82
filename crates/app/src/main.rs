use std::path::PathBuf;

use clap::{Parser, Subcommand};

use auroral_core::{
    Animation, DeviceConfig, FrameQueue, OutputManager, ReactiveBase, RoutingPolicy,
};
use tracing_subscriber::EnvFilter;

mod loopback;
mod spinner;

use loopback::LoopbackOutput;
use spinner::SpinnerAnimation;

fn main() -> auroral_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { lights, cycles } => run_demo(lights, cycles),
        Commands::WriteConfig { lights, output } => write_config(lights, &output),
    }
}

/// Drives the full pipeline offline: synthetic spectrum snapshots feed the
/// reactive base, the spinner renders frames into the queue, and the output
/// thread's half of the loop drains them through a loopback backend.
fn run_demo(lights: usize, cycles: u32) -> auroral_core::Result<()> {
    tracing::info!(lights, cycles, "starting demo pipeline");

    let config = DeviceConfig::new(lights);
    config.validate()?;

    let base = ReactiveBase::new(config.clone());
    let mut animation = SpinnerAnimation::new(&config, base.clone());
    let queue = FrameQueue::new(&config)?;
    queue.set_animation_active(true);

    let mut manager = OutputManager::new(RoutingPolicy::TopPriority);
    manager.subscribe(Box::new(|identifier, state| {
        tracing::debug!(identifier, ?state, "backend state changed");
    }));
    manager.register(Box::new(LoopbackOutput::new("loopback", 1, lights)));
    manager.initialize("loopback")?;

    for cycle in 0..cycles {
        base.update_audio_snapshot(&synthetic_snapshot(cycle));
        queue.push_frame(&animation.next_frame())?;

        if let Some(frame) = queue.pop() {
            queue.set_live_frame(&frame)?;
            manager.write_all(&frame)?;
            queue.mark_processed();
        } else {
            queue.add_idle_time(config.frame_period_ms as u64);
        }
    }

    let features = base.features();
    tracing::info!(
        average_intensity = features.average_intensity,
        frequency_distribution = features.average_frequency_distribution,
        "demo finished"
    );

    queue.set_animation_active(false);
    queue.clear();
    manager.shutdown_all();
    Ok(())
}

fn write_config(lights: usize, output: &PathBuf) -> auroral_core::Result<()> {
    tracing::info!(lights, ?output, "writing default device configuration");
    let config = DeviceConfig::new(lights);
    config.validate()?;
    config.to_json_file(output)
}

/// Deterministic stand-in for an audio capture source.
fn synthetic_snapshot(cycle: u32) -> Vec<f64> {
    (0..128)
        .map(|bin| {
            let phase = cycle as f64 * 0.37 + bin as f64 * 0.11;
            phase.sin().abs() * (1.0 - bin as f64 / 256.0)
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive LED controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the core pipeline against a loopback backend with synthetic audio.
    Demo {
        /// Number of lights on the simulated strand.
        #[arg(short, long, default_value_t = 50)]
        lights: usize,
        /// How many frame cycles to simulate.
        #[arg(short, long, default_value_t = 200)]
        cycles: u32,
    },
    /// Write a default device configuration file.
    WriteConfig {
        /// Number of lights on the strand.
        #[arg(short, long, default_value_t = 50)]
        lights: usize,
        /// Destination path for the JSON configuration.
        output: PathBuf,
    },
}
