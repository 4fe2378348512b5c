use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use mysql_auth_state::db::MySqlSessionStore;
use mysql_auth_state::service::SessionData;
use mysql_auth_state::MySqlAuthConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Inspect and reset auth sessions stored in MySQL.
///
/// Connection settings come from `MYSQL_AUTH_*` environment variables
/// (a `.env` file is read first).
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Account to operate on; overrides MYSQL_AUTH_SESSION.
    #[arg(long, global = true)]
    session: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect and create the session table if it is missing.
    Bootstrap,
    /// List the keys stored for the session.
    Keys,
    /// Delete all key material, keeping the credentials.
    Clear,
    /// Delete everything stored for the session, credentials included.
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let cfg = match cli.session {
        Some(session) => {
            let mut cfg = MySqlAuthConfig::from_env_unchecked()?;
            cfg.session = session;
            cfg
        }
        None => MySqlAuthConfig::from_env_unchecked()?,
    };

    info!(
        host = %cfg.host,
        port = cfg.port,
        database = %cfg.database,
        table = %cfg.table_name,
        session = %cfg.session
    );

    let store = MySqlSessionStore::connect(cfg.clone())?;
    let data = SessionData::new(store.clone(), cfg.session.clone())?;

    match cli.command {
        Command::Bootstrap => {
            store.connector().connection(false).await?;
            info!("table {} is ready", cfg.table_name);
        }
        Command::Keys => {
            let keys = data.keys().await?;
            info!(count = keys.len(), "stored keys");
            for key in keys {
                println!("{key}");
            }
        }
        Command::Clear => {
            data.clear_all().await?;
            info!("cleared key material for {}", data.account());
        }
        Command::Reset => {
            data.remove_all().await?;
            info!("removed all rows for {}", data.account());
        }
    }

    store.connector().close().await;
    Ok(())
}
