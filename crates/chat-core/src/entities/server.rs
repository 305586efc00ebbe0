//! Server entity - a guild on the platform

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Server snapshot
///
/// Only the scalar fields of the server. Roles and channels are cached as
/// their own entities and point back at the server by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub owner_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub large: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    /// Set while the server is in an outage
    #[serde(default)]
    pub unavailable: bool,
}

impl Server {
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            owner_id,
            region: None,
            large: false,
            member_count: None,
            unavailable: false,
        }
    }

    /// Placeholder for servers listed as unavailable in READY
    pub fn unavailable(id: Snowflake) -> Self {
        Self {
            unavailable: true,
            ..Self::new(id, String::new(), Snowflake::default())
        }
    }

    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    /// The @everyone role id equals the server id
    #[inline]
    pub fn everyone_role_id(&self) -> Snowflake {
        self.id
    }
}
