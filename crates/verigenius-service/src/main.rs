use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use tracing::info;
use verigenius_adapters::StoreConfig;
use verigenius_core::MatchPolicy;
use verigenius_service::{build_router, ServiceConfig, ServiceState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MatchPolicyArg {
    /// Compare both names case-insensitively (default).
    CaseInsensitive,
    /// Legacy behavior: last name byte-exact against its stored form.
    ExactLast,
}

impl From<MatchPolicyArg> for MatchPolicy {
    fn from(arg: MatchPolicyArg) -> Self {
        match arg {
            MatchPolicyArg::CaseInsensitive => MatchPolicy::CaseInsensitiveBoth,
            MatchPolicyArg::ExactLast => MatchPolicy::CaseInsensitiveFirstExactLast,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "verigeniusd", version, about = "VeriGenius student validation REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8090
    #[arg(long, default_value = "127.0.0.1:8090")]
    listen: SocketAddr,
    /// Record store backend. `auto` picks postgres when a database url is configured.
    #[arg(long, value_enum, default_value_t = StoreMode::Auto, env = "VERIGENIUS_STORE")]
    store: StoreMode,
    /// PostgreSQL url for student records and request logs.
    #[arg(long, env = "VERIGENIUS_DATABASE_URL")]
    database_url: Option<String>,
    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 5, env = "VERIGENIUS_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,
    /// Name comparison policy for identity matching.
    #[arg(long, value_enum, default_value_t = MatchPolicyArg::CaseInsensitive, env = "VERIGENIUS_MATCH_POLICY")]
    match_policy: MatchPolicyArg,
    /// Seed deterministic demo records (memory backend only).
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

fn resolve_store_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let store = match cli.store {
        StoreMode::Memory => StoreConfig::Memory,
        StoreMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("store=postgres requires --database-url or DATABASE_URL")
            })?;
            StoreConfig::postgres(database_url, cli.pg_max_connections)
        }
        StoreMode::Auto => {
            if let Some(database_url) = resolved_url {
                StoreConfig::postgres(database_url, cli.pg_max_connections)
            } else {
                StoreConfig::Memory
            }
        }
    };

    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "verigenius_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let store = resolve_store_config(&cli)?;
    let config = ServiceConfig {
        store,
        match_policy: cli.match_policy.into(),
        seed_demo: cli.seed_demo,
    };

    let state = ServiceState::bootstrap(config).await?;
    info!(
        store_backend = state.store.backend(),
        audit_backend = state.audit.backend(),
        match_policy = state.engine.match_policy().label(),
        "verigenius-service bootstrapped"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("verigenius-service listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
