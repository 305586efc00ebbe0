//! Snowflake ID - 64-bit identifier assigned by the platform to every entity
//!
//! Layout:
//! - Bits 63-22: Timestamp (milliseconds since the platform epoch)
//! - Bits 21-17: Internal worker ID
//! - Bits 16-12: Internal process ID
//! - Bits 11-0:  Increment

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Platform snowflake ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(u64);

impl Snowflake {
    /// Platform epoch: 2015-01-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: u64 = 1_420_070_400_000;

    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Creation time in milliseconds since the Unix epoch
    #[inline]
    pub const fn timestamp(&self) -> u64 {
        (self.0 >> 22) + Self::EPOCH
    }

    #[inline]
    pub const fn worker_id(&self) -> u8 {
        ((self.0 >> 17) & 0x1F) as u8
    }

    #[inline]
    pub const fn process_id(&self) -> u8 {
        ((self.0 >> 12) & 0x1F) as u8
    }

    #[inline]
    pub const fn increment(&self) -> u16 {
        (self.0 & 0xFFF) as u16
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp() as i64)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Smallest snowflake that could have been created at `time`.
    ///
    /// Useful as a pagination cursor (`before` / `after` query parameters).
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let millis = u64::try_from(time.timestamp_millis()).unwrap_or(0);
        Self(millis.saturating_sub(Self::EPOCH) << 22)
    }

    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        s.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeParseError::InvalidFormat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid snowflake format")]
    InvalidFormat,
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// The wire format carries ids as strings
impl Serialize for Snowflake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing a snowflake ID")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                Ok(Snowflake(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("negative snowflake"))
            }

            fn visit_str<E>(self, value: &str) -> Result<Snowflake, E>
            where
                E: de::Error,
            {
                value
                    .parse::<u64>()
                    .map(Snowflake)
                    .map_err(|_| de::Error::custom("invalid snowflake string"))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_parse() {
        let sf = Snowflake::parse("175928847299117063").unwrap();
        assert_eq!(sf.get(), 175_928_847_299_117_063);

        assert!(Snowflake::parse("invalid").is_err());
        assert!(Snowflake::parse("-1").is_err());
    }

    #[test]
    fn test_snowflake_components() {
        // Example id from the platform documentation
        let sf = Snowflake::new(175_928_847_299_117_063);
        assert_eq!(sf.timestamp(), 1_462_015_105_796);
        assert_eq!(sf.worker_id(), 1);
        assert_eq!(sf.process_id(), 0);
        assert_eq!(sf.increment(), 7);
    }

    #[test]
    fn test_snowflake_created_at() {
        let sf = Snowflake::new(175_928_847_299_117_063);
        assert_eq!(sf.created_at().timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn test_snowflake_from_datetime() {
        let time = Utc.timestamp_millis_opt(1_462_015_105_796).unwrap();
        let sf = Snowflake::from_datetime(time);
        assert_eq!(sf.timestamp(), 1_462_015_105_796);
        assert_eq!(sf.increment(), 0);

        let before_epoch = Utc.timestamp_millis_opt(0).unwrap();
        assert!(Snowflake::from_datetime(before_epoch).is_zero());
    }

    #[test]
    fn test_snowflake_serialize_json() {
        let sf = Snowflake::new(123_456_789_012_345_678);
        let json = serde_json::to_string(&sf).unwrap();
        assert_eq!(json, "\"123456789012345678\"");
    }

    #[test]
    fn test_snowflake_deserialize_string_and_number() {
        let sf: Snowflake = serde_json::from_str("\"123456789012345678\"").unwrap();
        assert_eq!(sf.get(), 123_456_789_012_345_678);

        let sf: Snowflake = serde_json::from_str("12345").unwrap();
        assert_eq!(sf.get(), 12345);

        assert!(serde_json::from_str::<Snowflake>("-5").is_err());
    }

    #[test]
    fn test_snowflake_ordering_follows_creation() {
        let older = Snowflake::new(100 << 22);
        let newer = Snowflake::new(200 << 22);
        assert!(older < newer);
        assert!(older.created_at() < newer.created_at());
    }
}
