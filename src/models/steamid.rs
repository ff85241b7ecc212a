// src/models/steamid.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lowest 64-bit id of an individual account in the public universe.
const INDIVIDUAL_BASE: u64 = 0x0110_0001_0000_0000;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid steam id: {0}")]
pub struct SteamIdParseError(pub String);

/// Stable 64-bit player identity as reported by the game server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SteamId(u64);

impl SteamId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn from_account_id(account_id: u32) -> Self {
        Self(INDIVIDUAL_BASE + u64::from(account_id))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 > INDIVIDUAL_BASE && self.0 <= INDIVIDUAL_BASE + u64::from(u32::MAX)
    }

    pub fn account_id(&self) -> u32 {
        self.0.saturating_sub(INDIVIDUAL_BASE) as u32
    }

    /// Legacy `STEAM_0:Y:Z` rendering used by SourceMod targeting.
    pub fn steam2(&self) -> String {
        let account = self.account_id();
        format!("STEAM_0:{}:{}", account % 2, account / 2)
    }

    /// `[U:1:N]` rendering as printed by `status`.
    pub fn steam3(&self) -> String {
        format!("[U:1:{}]", self.account_id())
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SteamId {
    type Err = SteamIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || SteamIdParseError(raw.to_string());

        if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let mut parts = inner.split(':');
            return match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some("U"), Some(_), Some(account), None) => account
                    .parse::<u32>()
                    .map(Self::from_account_id)
                    .map_err(|_| invalid()),
                _ => Err(invalid()),
            };
        }

        if let Some(rest) = raw.strip_prefix("STEAM_") {
            let parts: Vec<&str> = rest.split(':').collect();
            if parts.len() != 3 {
                return Err(invalid());
            }
            let low: u32 = parts[1].parse().map_err(|_| invalid())?;
            let high: u32 = parts[2].parse().map_err(|_| invalid())?;
            if low > 1 {
                return Err(invalid());
            }
            let account = high
                .checked_mul(2)
                .and_then(|v| v.checked_add(low))
                .ok_or_else(invalid)?;
            return Ok(Self::from_account_id(account));
        }

        raw.parse::<u64>().map(Self).map_err(|_| invalid())
    }
}

impl TryFrom<String> for SteamId {
    type Error = SteamIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SteamId> for String {
    fn from(value: SteamId) -> Self {
        value.0.to_string()
    }
}
