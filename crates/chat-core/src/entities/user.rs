//! User entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

const CDN_BASE: &str = "https://cdn.discordapp.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            discriminator: None,
            global_name: None,
            avatar: None,
            bot: false,
        }
    }

    /// Display name, falling back to the username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// `username#1234` for legacy accounts, plain username otherwise
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }

    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("{CDN_BASE}/avatars/{}/{hash}.png", self.id),
            None => format!("{CDN_BASE}/embed/avatars/{}.png", (self.id.get() >> 22) % 6),
        }
    }
}
