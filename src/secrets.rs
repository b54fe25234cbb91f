//! Merchant credentials from Vault (AppRole login, KV v2).

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use vaultrs::auth::approle;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

use crate::config::GatewaySettings;

const GATEWAY_SECRET_PATH: &str = "gateway";

#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub dealer_code: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("dealer_code", &self.dealer_code)
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

impl GatewayCredentials {
    fn from_secret(secret: &HashMap<String, String>) -> Result<Self> {
        let field = |key: &str| {
            secret
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .with_context(|| format!("{} key not found in Vault secret/{}", key, GATEWAY_SECRET_PATH))
        };

        Ok(Self {
            dealer_code: field("dealer_code")?,
            username: field("username")?,
            password: field("password")?,
        })
    }

    pub fn apply(self, settings: GatewaySettings) -> GatewaySettings {
        settings.with_credentials(self.dealer_code, self.username, self.password)
    }
}

pub struct SecretsManager {
    client: VaultClient,
    kv_mount: String,
}

impl SecretsManager {
    /// Logs in when `VAULT_ROLE_ID` is set; `None` means Vault is not in use.
    pub async fn from_env() -> Result<Option<Self>> {
        match env::var("VAULT_ROLE_ID") {
            Ok(role_id) if !role_id.trim().is_empty() => Self::login(&role_id).await.map(Some),
            _ => Ok(None),
        }
    }

    async fn login(role_id: &str) -> Result<Self> {
        let vault_addr =
            env::var("VAULT_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8200".to_string());
        let secret_id = env::var("VAULT_SECRET_ID").context("VAULT_SECRET_ID is required")?;
        let auth_mount = env::var("VAULT_AUTH_MOUNT").unwrap_or_else(|_| "approle".to_string());
        let kv_mount = env::var("VAULT_KV_MOUNT").unwrap_or_else(|_| "secret".to_string());

        let mut client = VaultClient::new(
            VaultClientSettingsBuilder::default()
                .address(&vault_addr)
                .build()
                .context("failed to build Vault client settings")?,
        )
        .context("failed to create Vault client")?;

        let auth = approle::login(&client, &auth_mount, role_id, &secret_id)
            .await
            .context("failed to authenticate to Vault with AppRole")?;
        client.set_token(&auth.client_token);

        Ok(Self { client, kv_mount })
    }

    pub async fn gateway_credentials(&self) -> Result<GatewayCredentials> {
        let secret: HashMap<String, String> =
            kv2::read(&self.client, &self.kv_mount, GATEWAY_SECRET_PATH)
                .await
                .context("failed to read secret/gateway from Vault")?;

        GatewayCredentials::from_secret(&secret)
    }
}
