//! `wayfind-cli` – Wayfind command line interface
//!
//! Runs the obstacle engine against a simulated walk and prints per-frame
//! guidance.  It:
//!
//! 1. Loads `~/.wayfind/config.toml` (defaults when absent) and applies
//!    `WAYFIND_*` environment overrides and command line arguments.
//! 2. Builds a [`SimDepthSensor`] for the configured scene preset.
//! 3. Runs a [`Session`] at the configured frame rate, printing every event
//!    from the bus either as coloured text or as NDJSON (`--json`).
//! 4. Intercepts **Ctrl-C** to stop after the current frame and print the
//!    session summary.

mod config;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use wayfind_hal::scene::{PRESETS, Scene};
use wayfind_hal::sim::SimDepthSensor;
use wayfind_middleware::{EventBus, Topic, TopicReceiver};
use wayfind_runtime::{FrameBudget, Session, SessionStats, init_tracing};
use wayfind_types::{Direction, Event, EventPayload, FrameReport};

const USAGE: &str = "\
Usage: wayfind [OPTIONS]

Options:
  --frames N      Stop after N frames (default: run until Ctrl-C)
  --scene NAME    Scene preset: open, pillar, corridor
  --json          Print events as newline-delimited JSON
  --init-config   Write the default config to ~/.wayfind/config.toml and exit
  --help          Show this message";

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Args {
    frames: Option<u64>,
    scene: Option<String>,
    json: bool,
    init_config: bool,
    help: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let value = args.next().ok_or("--frames needs a value")?;
                let n = value
                    .parse::<u64>()
                    .map_err(|_| format!("--frames expects a number, got '{value}'"))?;
                parsed.frames = Some(n);
            }
            "--scene" => {
                parsed.scene = Some(args.next().ok_or("--scene needs a value")?);
            }
            "--json" => parsed.json = true,
            "--init-config" => parsed.init_config = true,
            "--help" | "-h" => parsed.help = true,
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {}\n\n{}", "error".red().bold(), e, USAGE);
            return ExitCode::from(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    // Tracing must be initialised before the Tokio runtime starts.
    let _telemetry = init_tracing("wayfind");

    if args.init_config {
        return match config::save(&config::Config::default()) {
            Ok(()) => {
                println!(
                    "  {} Config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let mut cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    if let Some(scene) = args.scene {
        cfg.sim.scene = scene;
    }

    let Some(scene) = Scene::preset(&cfg.sim.scene) else {
        eprintln!(
            "{}: unknown scene '{}' (available: {})",
            "error".red().bold(),
            cfg.sim.scene,
            PRESETS.join(", ")
        );
        return ExitCode::from(2);
    };
    let sensor = SimDepthSensor::new(scene)
        .with_resolution(cfg.sim.width, cfg.sim.height)
        .with_walk_speed(cfg.sim.walk_speed)
        .with_max_range(cfg.sim.max_range)
        .with_degenerate_every(cfg.sim.degenerate_every);

    let bus = EventBus::default();
    let mut session = match Session::new(
        sensor,
        cfg.engine.clone(),
        bus.clone(),
        FrameBudget::from_millis(cfg.frame_budget_ms),
    ) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}: {}", "Invalid engine settings".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the walk can only end after --frames");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    if !args.json {
        print_banner(&cfg);
    }
    let (json, frames) = (args.json, args.frames);
    let stats = runtime.block_on(async move {
        let printers: Vec<_> = [Topic::Guidance, Topic::Navigation, Topic::SystemAlerts]
            .into_iter()
            .map(|topic| tokio::spawn(print_events(bus.subscribe_to(topic), json)))
            .collect();
        drop(bus);

        let stats = session
            .run(frames, cfg.frame_period(), shutdown)
            .await;

        // Dropping the last sender closes every topic so the printers drain
        // and exit.
        drop(session);
        for printer in printers {
            let _ = printer.await;
        }
        stats
    });

    print_summary(&stats, json);
    ExitCode::SUCCESS
}

async fn print_events(mut rx: TopicReceiver, json: bool) {
    while let Some(event) = rx.next_event().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialise event"),
            }
        } else {
            print_event(&event);
        }
    }
}

fn print_event(event: &Event) {
    match &event.payload {
        EventPayload::Guidance(report) => println!("{}", format_report(report)),
        EventPayload::DirectionChanged { from, to } => {
            println!("  {} {} → {}", "↺".cyan().bold(), from, colour_direction(*to));
        }
        EventPayload::FrameSkipped { frame, reason } => {
            println!("  {} frame {} skipped: {}", "!".yellow().bold(), frame, reason);
        }
        EventPayload::BudgetOverrun {
            frame,
            elapsed_ms,
            budget_ms,
        } => {
            println!(
                "  {} frame {} took {:.1} ms (budget {:.0} ms)",
                "!".yellow().bold(),
                frame,
                elapsed_ms,
                budget_ms
            );
        }
        EventPayload::SensorFault { sensor, message } => {
            println!("  {} sensor {}: {}", "✗".red().bold(), sensor, message);
        }
    }
}

fn format_report(report: &FrameReport) -> String {
    let closest = if report.direction == Direction::Clear {
        "-".to_string()
    } else {
        format!("{:.2} m", report.closest_m)
    };
    format!(
        "  #{:<5} {:<6} closest {:>7}  heading {:>6.1}°  ground {:>5.2} m",
        report.frame,
        colour_direction(report.direction),
        closest,
        report.heading_deg,
        report.ground_m
    )
}

fn colour_direction(direction: Direction) -> colored::ColoredString {
    match direction {
        Direction::Clear => direction.to_string().green(),
        Direction::Left | Direction::Right => direction.to_string().yellow().bold(),
    }
}

fn print_summary(stats: &SessionStats, json: bool) {
    if json {
        match serde_json::to_string(stats) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialise summary"),
        }
        return;
    }
    println!();
    println!("  {}", "Session summary".bold());
    println!("    frames            {}", stats.frames);
    println!("    skipped           {}", stats.skipped);
    println!("    blocked frames    {}", stats.blocked_frames);
    println!("    direction changes {}", stats.direction_changes);
    println!("    sensor faults     {}", stats.sensor_faults);
    println!(
        "    frame time        {:.2} ms mean, {:.2} ms worst, {} over budget",
        stats.mean_frame_ms, stats.worst_frame_ms, stats.budget_overruns
    );
}

fn print_banner(cfg: &config::Config) {
    println!();
    println!(
        "  {} {}",
        "Wayfind".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!(
        "  scene {} · {}×{} depth · {:.0} Hz · budget {} ms",
        cfg.sim.scene.bold(),
        cfg.sim.width,
        cfg.sim.height,
        cfg.frame_rate_hz,
        cfg.frame_budget_ms
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold());
}
