use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use darkroom_editor::{Config, FileStore, Session, script};

/// Replays an editing script against the stored history of an image.
#[derive(Debug, Parser)]
#[command(name = "darkroom-editor", version, about)]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = "darkroom.toml")]
    config: PathBuf,

    /// History store; overrides `store.path` of the configuration.
    #[arg(long)]
    store: Option<PathBuf>,

    /// RON list of session commands.
    script: PathBuf,
}

fn run(args: Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store_path = args.store.unwrap_or_else(|| config.store.path.clone());
    let store = FileStore::open(store_path)?;
    let commands = script::load(&args.script)?;
    log::info!("running {} commands from {}", commands.len(), args.script.display());

    let mut session = Session::open(&config, store)?;
    session.run(&commands, &mut std::io::stdout().lock())?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let (config, config_error) = Config::load_or_default(&args.config);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log.filter))
        .init();
    match config_error {
        Some(e) => log::warn!("No config file ({e}), using defaults"),
        None => log::info!("Loaded config {}", args.config.display()),
    }

    match run(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
