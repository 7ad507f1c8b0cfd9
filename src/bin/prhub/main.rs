mod display;

use std::io::BufRead;

use anyhow::{Context, Result};
use prhub::{
    Command, Config, Credential, CredentialStore, Dashboard, DashboardError, FileCredentialStore,
    Forge, GitHub, Invocation, KeyringCredentialStore, QuerySpec, Session, Tab, aggregate,
    config::{StoreLocation, credential_from_env},
    fetch_authored, fetch_merged, fetch_reviews, login, logout, parse_args, restore_session,
    verify_credential, within,
};
use tracing::debug;

use display::display_dashboard;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn read_token_from_stdin() -> Result<String> {
    eprintln!("Paste a classic personal access token (ghp_...):");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read token from stdin")?;
    Ok(line.trim().to_string())
}

fn open_store(config: &Config) -> Result<Box<dyn CredentialStore>> {
    let store: Box<dyn CredentialStore> = match &config.store {
        StoreLocation::Keyring => Box::new(KeyringCredentialStore::new(&config.api_base)?),
        StoreLocation::File(path) => Box::new(FileCredentialStore::new(path)),
    };
    Ok(store)
}

/// The stored session, or else a token from the environment.
async fn acquire_session(forge: &GitHub, store: &dyn CredentialStore) -> Result<Session> {
    if let Some(session) = restore_session(forge, store).await? {
        return Ok(session);
    }

    let credential = credential_from_env().ok_or(DashboardError::MissingCredential)?;
    debug!("using token from environment");
    let identity = verify_credential(forge, &credential).await?;
    Ok(Session {
        credential,
        identity,
    })
}

/// Loads only the collections the tab displays.
async fn load_tab<F>(
    forge: &F,
    credential: &Credential,
    spec: &QuerySpec,
    tab: Tab,
) -> Result<Dashboard, DashboardError>
where
    F: Forge + ?Sized,
{
    Ok(match tab {
        Tab::Mine => Dashboard {
            authored: fetch_authored(forge, credential, spec).await?,
            ..Dashboard::default()
        },
        Tab::Reviews => Dashboard {
            reviews: fetch_reviews(forge, credential, spec).await?,
            ..Dashboard::default()
        },
        Tab::Merged => Dashboard {
            merged: fetch_merged(forge, credential, spec).await?,
            ..Dashboard::default()
        },
        Tab::All => aggregate(forge, credential, spec).await?,
    })
}

async fn run(invocation: Invocation) -> Result<()> {
    let Invocation {
        config, command, ..
    } = invocation;

    let forge = GitHub::new(&config).context("Failed to create GitHub client")?;
    let store = open_store(&config)?;
    let store = store.as_ref();

    match command {
        Command::Login { token } => {
            let token = match token {
                Some(token) => token,
                None => read_token_from_stdin()?,
            };
            let credential = Credential::new(token)?;
            if !credential.is_classic_token() {
                anyhow::bail!("Only classic tokens (ghp_...) are supported");
            }
            let session = login(&forge, store, credential).await?;
            println!("Logged in as {}", session.login());
        }
        Command::Logout => {
            logout(store).await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let session = acquire_session(&forge, store).await?;
            println!("{}", session.login());
        }
        Command::Show { tab, display: options } => {
            let session = acquire_session(&forge, store).await?;
            let spec = QuerySpec::for_identity(&session.identity)?.with_windows(config.windows);

            let dashboard = within(
                config.aggregate_timeout,
                load_tab(&forge, &session.credential, &spec, tab),
            )
            .await?;

            let mut stdout = std::io::stdout().lock();
            display_dashboard(tab, &dashboard, &options, &mut stdout)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let invocation = match parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            }
            eprintln!("Error: {err:#}");
            std::process::exit(2);
        }
    };

    init_tracing(invocation.verbose);

    if let Err(err) = run(invocation).await {
        match err.downcast_ref::<DashboardError>() {
            Some(dashboard_err) => {
                debug!(error = %err, "command failed");
                eprintln!("{}", dashboard_err.user_message());
            }
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}
