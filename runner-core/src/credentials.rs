//! Per-domain credential cache
//!
//! Callers register an access token for their domain before asking for a
//! render. `Start` looks the token up and passes it to the initializer.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Access token presented by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenModel {
    /// Origin domain of the caller
    pub domain: String,
    /// URL scheme used to reach the domain
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

fn default_scheme() -> String {
    "https".to_string()
}

/// Cache key for a service/domain pair
pub fn credential_key(service: &str, domain: &str) -> String {
    format!("{}_{}", service, domain)
}

/// Key-value store for caller credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert or replace the credential under `key`
    async fn put(&self, key: &str, token: TokenModel);

    /// Look up the credential under `key`
    async fn get(&self, key: &str) -> Option<TokenModel>;

    /// Remove the credential under `key`, returning whether one existed
    async fn remove(&self, key: &str) -> bool;
}

/// In-process credential store
#[derive(Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<String, TokenModel>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, key: &str, token: TokenModel) {
        self.tokens.write().await.insert(key.to_string(), token);
    }

    async fn get(&self, key: &str) -> Option<TokenModel> {
        self.tokens.read().await.get(key).cloned()
    }

    async fn remove(&self, key: &str) -> bool {
        self.tokens.write().await.remove(key).is_some()
    }
}
