use anyhow::Result;
use clap::Parser;
use micelog::{MicelogConfig, MicelogOrchestrator};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "micelog")]
#[command(about = "Concurrent multi-mouse motion logger with periodic telemetry")]
#[command(version)]
#[command(long_about = "Reads raw relative-motion packets from several pointing devices at once, \
publishes per-device motion summaries at a fixed interval and archives every device's readings \
as CSV on shutdown.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "micelog.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Extra device paths appended to the configured list
    #[arg(long = "device", value_name = "PATH", help = "Device path to read (repeatable)")]
    devices: Vec<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Print the resolved configuration and exit
    #[arg(long, help = "Print the configuration after file and environment overrides, then exit")]
    print_effective_config: bool,

    /// Dry run mode - open devices but don't start readers
    #[arg(long, help = "Open devices and sinks but don't start reading")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Write logs to a file in addition to stderr")]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting micelog v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match MicelogConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    config.devices.paths.extend(args.devices.iter().cloned());

    if args.print_effective_config {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut orchestrator = MicelogOrchestrator::new(config).await.map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await?;

    if args.dry_run {
        info!("Dry run mode - devices opened but not read");
        println!(
            "✓ Dry run completed successfully - {} devices opened",
            orchestrator.devices().len()
        );
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    let report = orchestrator.run().await.map_err(|e| {
        error!("Error during execution: {}", e);
        e
    })?;

    let exit_code = report.exit_code();
    info!("micelog exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("micelog={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .boxed()
        }
    };

    // Telemetry goes to stdout by default, so logs stay on stderr and the optional file.
    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# micelog configuration file");
    println!("# This is the default configuration with all available options");
    println!();

    let default_config = r#"[devices]
# Device paths, one per device, in order
# (list candidates with: ls -la /dev/input/by-path)
paths = []
# Optional file with one device path per line
# list_file = "mice.config"
# Use the last path component as device id (false: 0, 1, 2, ...)
id_from_path = true
# Log every decoded reading at info level
print_readings = false
# Longest a reader waits on an idle device before checking for shutdown
poll_interval_ms = 100

[telemetry]
enabled = true
# Aggregation and publish interval in milliseconds
interval_ms = 500
# Topic attached to every message
topic = "micelog/motion"
# "-" for stdout, otherwise a file appended to
output = "-"

[archive]
# Write <directory>/<device id>.csv on shutdown
enabled = true
directory = "logs"

[shutdown]
# How long to wait for each reader before abandoning it
reader_join_timeout_ms = 1000
aggregator_timeout_ms = 2000
"#;

    println!("{}", default_config);
}
