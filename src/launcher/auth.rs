//! Account boundary consumed by the launcher.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity handed to the game through its launch arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAccount {
    pub player_name: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self) -> Result<GameAccount>;
}

/// Offline play: a fixed name with a name-derived UUID and a dummy token.
#[derive(Debug, Clone)]
pub struct OfflineAuth {
    player_name: String,
}

impl OfflineAuth {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for OfflineAuth {
    async fn authenticate(&self) -> Result<GameAccount> {
        let name = self.player_name.trim();
        if name.is_empty() {
            bail!("Player name is required for offline play");
        }
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("OfflinePlayer:{name}").as_bytes());
        Ok(GameAccount {
            player_name: name.to_string(),
            uuid: uuid.simple().to_string(),
            access_token: "0".to_string(),
            user_type: "legacy".to_string(),
        })
    }
}
