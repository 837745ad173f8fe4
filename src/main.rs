// ABOUTME: CLI entrypoint for readwise-atoms command
// ABOUTME: Wires settings, vault and notifier, handles error exit codes

use clap::Parser;
use readwise_atoms::{
    auth::{resolve_token, TOKEN_PAGE},
    cli::{Cli, Commands, ConfigAction},
    commands::Atoms,
    notify::TerminalNotifier,
    storage::{JsonSettingsStore, Paths},
    vault::FsVault,
    Error, Result,
};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("readwise-atoms: [E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let paths = Paths::new(cli.config.clone())?;
    paths.ensure_dirs()?;
    let store = JsonSettingsStore::from_paths(&paths);

    let command = cli.command();
    if let Commands::Config {
        action: ConfigAction::Path,
    } = command
    {
        println!("{}", store.path().display());
        return Ok(());
    }
    if let Commands::TokenPage = command {
        println!("Opening {}", TOKEN_PAGE);
        return open::that(TOKEN_PAGE).map_err(Error::Filesystem);
    }

    let mut notifier = TerminalNotifier::new();
    if cli.quiet {
        notifier = notifier.without_progress();
    }
    let vault = FsVault::new(&cli.vault);
    let mut atoms = Atoms::load(store, vault, notifier, Some(cli.api_base.clone()))?;

    if !matches!(command, Commands::Config { .. }) {
        if let Some(token) = resolve_token(cli.token.clone()) {
            atoms.override_token(token);
        }
    }

    match command {
        Commands::Start => {
            if atoms.startup().await?.is_none() {
                log::info!("syncOnStart is off, nothing to do (run `readwise-atoms sync`)");
            }
        }
        Commands::Sync => {
            atoms.sync().await?;
        }
        Commands::Resync => {
            atoms.resync().await?;
        }
        Commands::CheckToken => {
            atoms.check_token().await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&atoms.settings().redacted())?);
            }
            ConfigAction::Set { key, value } => {
                let value = match value.strip_prefix('@') {
                    Some(file) => std::fs::read_to_string(file)?,
                    None => value,
                };
                atoms.update_settings(|settings| settings.set(&key, &value))?;
                println!("{} updated", key);
            }
            ConfigAction::Path => {}
        },
        Commands::TokenPage => {}
    }

    Ok(())
}
