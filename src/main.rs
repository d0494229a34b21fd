mod alarm;
mod api;
mod effects;
mod plugin;
mod settings;
mod stopwatch;
mod style;
mod tick;
mod timezone;
mod ui;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use crate::alarm::manager::AlarmManager;
use crate::alarm::model::load_alarm_file;
use crate::api::{ApiServer, ApiServerConfig, ApiSharedState};
use crate::effects::LogNotifier;
use crate::plugin::{DateInfoPlugin, PluginRegistry};
use crate::settings::{SettingsSource, SettingsStore};
use crate::tick::ClockController;

#[derive(Parser, Debug)]
#[command(name = "deskclock", version, about = "Desktop digital clock with alarms, stopwatch and a companion API")]
struct Cli {
    /// Settings file (created on first change).
    #[arg(long, default_value = "clock_settings.json")]
    settings: PathBuf,

    /// Alarm file (missing file means no alarms yet).
    #[arg(long, default_value = "alarms.json")]
    alarms: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    api_bind: String,

    #[arg(long, default_value_t = 8888)]
    api_port: u16,

    /// Disable the companion HTTP API.
    #[arg(long)]
    no_api: bool,

    /// Run the tick loop without a window.
    #[arg(long)]
    headless: bool,

    /// Validate the settings and alarm files, print a summary, and exit.
    #[arg(long)]
    check: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let cli = Cli::parse();

    let store = SettingsStore::load(&cli.settings);
    let alarms = if cli.alarms.exists() {
        load_alarm_file(&cli.alarms)
            .with_context(|| format!("failed to load {}", cli.alarms.display()))?
    } else {
        Vec::new()
    };

    if cli.check {
        run_check(&cli, &store, alarms.len());
        return Ok(());
    }

    let manager = AlarmManager::from_alarms(alarms);
    let (effect_sender, effects_worker) = effects::spawn(Box::new(LogNotifier));
    let controller = ClockController::new(store, manager, cli.alarms.clone(), effect_sender);

    let api_server = if cli.no_api {
        None
    } else {
        Some(
            ApiServer::start(ApiServerConfig {
                bind_addr: cli.api_bind.clone(),
                port: cli.api_port,
            })
            .with_context(|| {
                format!(
                    "failed to start companion API at {}:{}",
                    cli.api_bind, cli.api_port
                )
            })?,
        )
    };
    let api_state = api_server.as_ref().map(|server| Arc::clone(&server.state));

    let mut plugins = PluginRegistry::new();
    plugins.register(Box::new(DateInfoPlugin));
    plugins.enable("date-info")?;

    let result = if cli.headless {
        run_headless(controller, api_state)
    } else {
        ui::run_gui(controller, plugins, api_state)
    };

    drop(api_server);
    drop(effects_worker);
    result
}

fn run_check(cli: &Cli, store: &SettingsStore, alarm_count: usize) {
    match store.source() {
        SettingsSource::File => {
            println!("settings: loaded from {}", cli.settings.display());
        }
        SettingsSource::Defaults => {
            println!(
                "settings: using defaults ({} missing or invalid)",
                cli.settings.display()
            );
        }
    }
    println!(
        "alarms: loaded {alarm_count} alarm(s) from {}",
        cli.alarms.display()
    );
    println!(
        "timezone: {}",
        crate::timezone::ClockZone::parse(&store.settings().timezone)
            .map(|zone| zone.name().to_string())
            .unwrap_or_else(|| "Local (unknown zone in settings)".to_string())
    );
}

/// Window-less tick loop: same controller, same cadence, driven by a plain
/// sleep. Useful together with the companion API.
fn run_headless(
    mut controller: ClockController,
    api_state: Option<Arc<Mutex<ApiSharedState>>>,
) -> Result<()> {
    loop {
        let mono = Instant::now();
        if let Some(state) = &api_state {
            let snapshot = api::build_snapshot(&controller, mono);
            for command in api::exchange(state, snapshot) {
                controller.apply_command(command);
            }
        }
        controller.tick(Utc::now(), mono);
        thread::sleep(Duration::from_secs(1));
    }
}
