//! Value objects - immutable types that represent platform concepts

mod intents;
mod permissions;
mod snowflake;

pub use intents::Intents;
pub use permissions::Permissions;
pub use snowflake::{Snowflake, SnowflakeParseError};
