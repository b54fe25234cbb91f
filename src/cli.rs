use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::gateway::hash::expected_digests;

#[derive(Parser)]
#[command(name = "unitedpay-gateway")]
#[command(about = "United Payment gateway - checkout and callback service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Validate configuration and backing services
    Config,

    /// Print the callback digests a CodeForHash produces
    Digest {
        #[arg(value_name = "CODE_FOR_HASH")]
        code: String,
    },

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    use std::path::Path;

    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let pool = crate::db::create_pool(database_url).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool, Path::new(crate::db::MIGRATIONS_DIR)).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Public Base URL: {}", config.public_base_url);
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(in-memory orders)".to_string())
    );
    println!(
        "  Redis URL: {}",
        config
            .redis_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(in-memory sandbox sessions)".to_string())
    );
    println!("  Test Mode: {}", config.gateway.test_mode);
    println!("  Dealer Code: {}", config.gateway.dealer_code);

    let report = crate::startup::validate_environment(config).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    Ok(())
}

pub fn handle_digest(code: &str) {
    let code = code.trim();
    let (success, failure) = expected_digests(code);
    println!("CodeForHash: {}", code.to_uppercase());
    println!("  success (T): {}", success);
    println!("  failure (F): {}", failure);
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
