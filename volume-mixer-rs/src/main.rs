//! Volume Mixer developer CLI.
//!
//! Drives the engine directly from a terminal: list what the OS reports,
//! change app volume and default devices, and watch the published variables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use volume_mixer_rs::{
    init_logging, DataFlow, DeviceRole, EngineConfig, MixerService, SwitchOutcome, VariableValue,
};

/// Volume Mixer - control per-app volume and default audio devices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "VOLUME_MIXER_LOG", default_value = "warn")]
    log_level: String,

    /// Engine configuration as JSON
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active devices and the current defaults
    Devices {
        #[arg(value_enum, default_value_t = Flow::Output)]
        flow: Flow,
    },

    /// List applications with an audio session
    Apps,

    /// Show volume and mute state of every application
    Sessions,

    /// Set an application's volume (0-100)
    SetVolume { app: String, volume: f32 },

    /// Change an application's volume by some points
    Adjust {
        app: String,
        #[arg(allow_hyphen_values = true)]
        delta: f32,
    },

    /// Toggle an application's mute state
    Mute { app: String },

    /// Make a device the default
    SetDefault {
        #[arg(value_enum)]
        flow: Flow,
        device_id: String,

        /// Only set the Multimedia role
        #[arg(long)]
        multimedia_only: bool,
    },

    /// Toggle the default between two devices
    Toggle {
        #[arg(value_enum)]
        flow: Flow,
        first: String,
        second: String,

        /// Only set the Multimedia role
        #[arg(long)]
        multimedia_only: bool,
    },

    /// Print published variables whenever they change
    Watch {
        /// Apps to track
        apps: Vec<String>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Flow {
    Output,
    Input,
}

impl From<Flow> for DataFlow {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Output => DataFlow::Render,
            Flow::Input => DataFlow::Capture,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(json) => EngineConfig::from_json(json).context("Invalid --config")?,
        None => EngineConfig::default(),
    };
    init_logging(Some(config.log_level.as_deref().unwrap_or(&args.log_level)));

    let service = MixerService::new(config);

    match args.command {
        Command::Devices { flow } => print_devices(&service, flow.into()),
        Command::Apps => {
            for app in service.list_apps() {
                println!("{app}");
            }
        }
        Command::Sessions => {
            for session in service.snapshot_sessions() {
                println!(
                    "{:<32} {:>3}%{}",
                    session.process_name,
                    session.volume_percent,
                    if session.muted { "  (muted)" } else { "" }
                );
            }
        }
        Command::SetVolume { app, volume } => {
            if !service.set_app_volume(&app, volume) {
                bail!("No audio session found for {}", app);
            }
        }
        Command::Adjust { app, delta } => {
            if !service.adjust_app_volume(&app, delta) {
                bail!("No audio session found for {}", app);
            }
        }
        Command::Mute { app } => {
            if !service.toggle_app_mute(&app) {
                bail!("No audio session found for {}", app);
            }
        }
        Command::SetDefault {
            flow,
            device_id,
            multimedia_only,
        } => {
            let outcome =
                service.switch_default_device(flow.into(), &device_id, &device_id, !multimedia_only);
            report(outcome)?;
        }
        Command::Toggle {
            flow,
            first,
            second,
            multimedia_only,
        } => {
            let outcome = service.toggle_default_device(
                flow.into(),
                (&first, &first),
                (&second, &second),
                !multimedia_only,
            );
            report(outcome)?;
        }
        Command::Watch { apps, seconds } => watch(&service, &apps, seconds)?,
    }

    service.shutdown();
    Ok(())
}

fn print_devices(service: &MixerService, flow: DataFlow) {
    let defaults: Vec<(DeviceRole, Option<String>)> = DeviceRole::ALL
        .into_iter()
        .map(|role| (role, service.default_device(flow, role).map(|d| d.id)))
        .collect();

    for device in service.list_devices(flow) {
        let roles: Vec<String> = defaults
            .iter()
            .filter(|(_, id)| id.as_deref() == Some(device.id.as_str()))
            .map(|(role, _)| format!("{role:?}"))
            .collect();
        println!("{}", device.name);
        println!("    id: {}", device.id);
        if !roles.is_empty() {
            println!("    default: {}", roles.join(", "));
        }
    }
}

fn report(outcome: SwitchOutcome) -> Result<()> {
    match outcome {
        SwitchOutcome::Switched {
            device_id,
            applied: true,
        } => {
            println!("Default set to {device_id}");
            Ok(())
        }
        SwitchOutcome::Switched {
            device_id,
            applied: false,
        } => bail!("Windows rejected {} for at least one role", device_id),
        SwitchOutcome::Unavailable { device_id } => bail!("Device {} is not available", device_id),
        SwitchOutcome::NotConfigured => bail!("No device given"),
        SwitchOutcome::ShutDown => bail!("Engine is shut down"),
    }
}

fn watch(service: &MixerService, apps: &[String], seconds: Option<u64>) -> Result<()> {
    for app in apps {
        service.track_app(Some(app), None);
    }
    service.enable();
    info!("Watching {} app(s)", apps.len());

    let deadline = seconds.map(|s| std::time::Instant::now() + Duration::from_secs(s));
    let mut last: BTreeMap<String, VariableValue> = BTreeMap::new();
    loop {
        let current = service.variables().snapshot();
        for (name, value) in &current {
            if last.get(name) != Some(value) {
                println!("{name} = {}", serde_json::to_string(value)?);
            }
        }
        for name in last.keys().filter(|k| !current.contains_key(*k)) {
            println!("{name} removed");
        }
        last = current;

        if deadline.is_some_and(|d| std::time::Instant::now() >= d) {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(250));
    }
}
