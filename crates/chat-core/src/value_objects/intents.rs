//! Gateway intents - which event groups the gateway should deliver

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u32 {
        const GUILDS                   = 1 << 0;
        /// Privileged
        const GUILD_MEMBERS            = 1 << 1;
        const GUILD_MODERATION         = 1 << 2;
        const GUILD_EMOJIS             = 1 << 3;
        const GUILD_INTEGRATIONS       = 1 << 4;
        const GUILD_WEBHOOKS           = 1 << 5;
        const GUILD_INVITES            = 1 << 6;
        const GUILD_VOICE_STATES       = 1 << 7;
        /// Privileged
        const GUILD_PRESENCES          = 1 << 8;
        const GUILD_MESSAGES           = 1 << 9;
        const GUILD_MESSAGE_REACTIONS  = 1 << 10;
        const GUILD_MESSAGE_TYPING     = 1 << 11;
        const DIRECT_MESSAGES          = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING    = 1 << 14;
        /// Privileged
        const MESSAGE_CONTENT          = 1 << 15;

        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    pub fn non_privileged() -> Self {
        Intents::all() - Intents::PRIVILEGED
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES
    }
}

// Identify sends intents as a plain integer
impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u32::deserialize(deserializer).map(Intents::from_bits_truncate)
    }
}
