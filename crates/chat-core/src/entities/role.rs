//! Role entity - a server role with permissions

use serde::{Deserialize, Serialize};

use crate::value_objects::{Permissions, Snowflake};

/// Role snapshot
///
/// Role payloads do not carry their server id; the gateway handler fills
/// `server_id` from the enclosing event before the role is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default, skip_serializing)]
    pub server_id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    pub fn new(id: Snowflake, server_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            server_id,
            name: name.into(),
            color: 0,
            hoist: false,
            position: 0,
            permissions: Permissions::empty(),
            managed: false,
            mentionable: false,
        }
    }

    /// The @everyone role shares its id with the server
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.server_id
    }

    #[inline]
    pub fn has_permission(&self, permission: Permissions) -> bool {
        self.permissions.has(permission)
    }

    /// Higher position means more authority; ties break on the lower id
    pub fn is_higher_than(&self, other: &Role) -> bool {
        (self.position, std::cmp::Reverse(self.id)) > (other.position, std::cmp::Reverse(other.id))
    }

    pub fn color_hex(&self) -> String {
        format!("{:06x}", self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_payload() {
        let json = r#"{
            "id": "41771983423143936",
            "name": "WE DEM BOYZZ!!!!!!",
            "color": 3447003,
            "hoist": true,
            "position": 1,
            "permissions": "66321471",
            "managed": false,
            "mentionable": false
        }"#;
        let role: Role = serde_json::from_str(json).unwrap();
        assert_eq!(role.id, Snowflake::new(41_771_983_423_143_936));
        assert!(role.server_id.is_zero());
        assert_eq!(role.color_hex(), "3498db");
        assert!(role.has_permission(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_everyone_role() {
        let role = Role::new(Snowflake::new(100), Snowflake::new(100), "@everyone");
        assert!(role.is_everyone());

        let role = Role::new(Snowflake::new(1), Snowflake::new(100), "Mod");
        assert!(!role.is_everyone());
    }

    #[test]
    fn test_role_hierarchy() {
        let mut admin = Role::new(Snowflake::new(1), Snowflake::new(100), "Admin");
        admin.position = 10;
        let mut moderator = Role::new(Snowflake::new(2), Snowflake::new(100), "Mod");
        moderator.position = 5;

        assert!(admin.is_higher_than(&moderator));
        assert!(!moderator.is_higher_than(&admin));

        moderator.position = 10;
        assert!(admin.is_higher_than(&moderator), "lower id wins a tie");
    }
}
