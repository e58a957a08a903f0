use clap::Parser;
use crashpad_init::{AppInfo, CrashpadConfig, LaunchPlan};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Starts the Crashpad handler for an application
#[derive(Parser, Debug)]
#[command(name = "crashpad-init", version)]
struct Args {
    /// The application's data directory
    #[arg(long)]
    data_dir: PathBuf,
    /// BugSplat database name
    #[arg(long)]
    database: String,
    #[arg(long)]
    app_name: String,
    #[arg(long)]
    app_version: String,
    /// TOML config overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory containing crashpad_handler, overrides the config
    #[arg(long)]
    handler_dir: Option<PathBuf>,
    /// Print the resolved launch plan as JSON and exit
    #[arg(long)]
    print_plan: bool,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Init(#[from] crashpad_init::Error),
    #[error("failed to serialize launch plan: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn init_logger(verbose: bool) {
    let default = if verbose {
        "crashpad_init=trace,crashpad_client=debug,info"
    } else {
        "crashpad_init=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn run(args: Args) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => CrashpadConfig::load(path)?,
        None => CrashpadConfig::default(),
    };

    if args.handler_dir.is_some() {
        config.handler_dir = args.handler_dir;
    }

    let app = AppInfo {
        data_dir: args.data_dir,
        database: args.database,
        name: args.app_name,
        version: args.app_version,
    };

    if args.print_plan {
        let plan = LaunchPlan::resolve(&app, &config)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    crashpad_init::initialize_with_config(&app, &config)?;

    let started = crashpad_init::global()
        .with_handler(|handler| {
            handler
                .wait_started(Duration::from_secs(10))
                .map(|_| handler.pid())
        })
        .unwrap_or(Ok(None));

    match started {
        Ok(Some(pid)) => tracing::info!("crash handler running with pid {}", pid),
        Ok(None) => tracing::info!("crash handler started"),
        Err(e) => return Err(crashpad_init::Error::HandlerStart(e).into()),
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
