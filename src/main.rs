use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use unitedpay_gateway::adapters::{
    MemoryOrderStore, MemoryPendingStore, MemoryStorefront, PostgresOrderStore, RedisPendingStore,
};
use unitedpay_gateway::cli::{Cli, Commands, DbCommands};
use unitedpay_gateway::config::Config;
use unitedpay_gateway::logging::{init_tracing, TracingSink};
use unitedpay_gateway::ports::{OrderStore, PendingPaymentStore};
use unitedpay_gateway::secrets::SecretsManager;
use unitedpay_gateway::{cli, create_app, db, AppState, Collaborators};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    init_tracing(config.log_json);

    if let Some(secrets) = SecretsManager::from_env().await? {
        let credentials = secrets.gateway_credentials().await?;
        config.gateway = credentials.apply(config.gateway);
        tracing::info!("Gateway credentials loaded from Vault");
    }

    match cli.command {
        Some(Commands::Config) => cli::handle_config_validate(&config).await,
        Some(Commands::Digest { code }) => {
            cli::handle_digest(&code);
            Ok(())
        }
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Serve) | None => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    for problem in config.validate() {
        tracing::warn!("Configuration problem: {}", problem);
    }

    let (orders, pool) = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool, Path::new(db::MIGRATIONS_DIR)).await?;
            let orders: Arc<dyn OrderStore> = Arc::new(PostgresOrderStore::new(pool.clone()));
            (orders, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            let orders: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
            (orders, None)
        }
    };

    let pending: Arc<dyn PendingPaymentStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisPendingStore::new(url)?),
        None => Arc::new(MemoryPendingStore::new()),
    };

    let storefront = Arc::new(MemoryStorefront::new(config.storefront.clone()));

    tracing::info!(
        test_mode = config.gateway.test_mode,
        gateway_configured = config.gateway.is_configured(),
        "United Payment gateway initialized"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::new(
        config,
        Collaborators {
            orders,
            pending,
            storefront,
            sink: Arc::new(TracingSink),
            client: None,
            db: pool,
        },
    );
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
