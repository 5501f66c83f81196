// Hecaton CLI
// Handles one XInput hierarchy event per invocation

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use hecaton_core::event::{Event, EventHandler, Outcome};
use hecaton_core::{registry_from_settings, Device, MasterLock, RoutingPolicy, RuleSet, Settings};

/// Group hotplugged input devices into XInput master pairs
#[derive(Parser, Debug)]
#[command(name = "hecaton")]
#[command(version)]
#[command(about = "Group hotplugged input devices into XInput master pairs", long_about = None)]
struct Args {
    /// Event name (XIDeviceEnabled, XIDeviceDisabled, XISlaveAdded, ..., listdevices)
    #[arg(required_unless_present = "check_config")]
    event: Option<String>,

    /// Device id the event refers to
    #[arg(required_unless_present = "check_config")]
    device_id: Option<u32>,

    /// Event arguments: device class and device name
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,

    /// Rule file (default: ./hecaton.toml, then ~/.config/hecaton.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Path to the xinput executable
    #[arg(long, value_name = "PATH")]
    xinput: Option<PathBuf>,

    /// Lag window in minutes for time-based grouping
    #[arg(long, value_name = "MINUTES")]
    lag: Option<i64>,

    /// Always query xinput instead of using the cached device snapshot
    #[arg(long)]
    no_cache: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Validate the rule file, print it and exit
    #[arg(long)]
    check_config: bool,
}

/// Load the rule file named on the command line, or the first one found
fn load_rules(args: &Args) -> anyhow::Result<Option<RuleSet>> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => match RuleSet::find() {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let rules = RuleSet::from_toml_path(&path)
        .with_context(|| format!("cannot load rules from {}", path.display()))?;
    Ok(Some(rules))
}

/// Defaults, then [General], then environment, then flags
fn build_settings(args: &Args, rules: Option<&RuleSet>) -> anyhow::Result<Settings> {
    let mut settings = Settings::new();
    if let Some(general) = rules.and_then(RuleSet::general) {
        settings.apply_general(general)?;
    }
    settings.apply_env()?;

    if let Some(path) = &args.xinput {
        settings.xinput_path = path.clone();
    }
    if let Some(lag) = args.lag {
        settings.set_lag(lag)?;
    }
    if args.no_cache {
        settings.cache_dir = None;
    }
    if args.quiet {
        settings.quiet = true;
    }
    Ok(settings)
}

fn init_logging(settings: &Settings, verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else if settings.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn print_rules(rules: &RuleSet) {
    for (group, patterns) in rules.groups() {
        println!("[{}]", group);
        for pattern in patterns {
            println!("  {}", pattern);
        }
    }
}

fn print_devices(devices: &[Device]) {
    for device in devices {
        println!(
            "{:>4}  {:<6} {:<8} ({:>3})  {}",
            device.id, device.role, device.kind, device.pair, device.name
        );
        if let Some(id) = device.hardware_id() {
            println!("        hardware id: {}", id);
        }
        if let Some(node) = device.device_node() {
            println!("        node: {}", node);
        }
        if let Some(path) = &device.system_path {
            println!("        path: {}", path.display());
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let rules = load_rules(&args)?;

    if let Some(rules) = &rules {
        if let Err(violations) = rules.validate() {
            for violation in violations {
                eprintln!("Error: {}", violation);
            }
            return Ok(ExitCode::FAILURE);
        }
    }

    let settings = build_settings(&args, rules.as_ref())?;
    init_logging(&settings, args.verbose);

    if args.check_config {
        match &rules {
            Some(rules) => {
                print_rules(rules);
                println!("Configuration is valid");
            }
            None => println!("No rule file found, grouping devices by time"),
        }
        return Ok(ExitCode::SUCCESS);
    }

    // clap guarantees both without --check-config
    let (Some(event_name), Some(device_id)) = (args.event.as_deref(), args.device_id) else {
        anyhow::bail!("missing <EVENT> <DEVICE_ID>");
    };
    let event = Event::parse(event_name)?;

    let policy = match &rules {
        Some(rules) => RoutingPolicy::rules(rules),
        None => RoutingPolicy::time_bucket(settings.lag_minutes),
    };
    let registry = registry_from_settings(&settings);

    let _lock = match event {
        Event::XIDeviceEnabled | Event::XIDeviceDisabled => match MasterLock::acquire(settings.lock_path()) {
            Ok(lock) => Some(lock),
            Err(e) => {
                log::warn!("running without lock {}: {}", settings.lock_path().display(), e);
                None
            }
        },
        _ => None,
    };

    let outcome = EventHandler::new(&registry, &policy).handle(event, device_id, &args.extra)?;
    log::debug!("{} {} -> {:?}", event_name, device_id, outcome);

    if let Outcome::Devices(devices) = &outcome {
        print_devices(devices);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
