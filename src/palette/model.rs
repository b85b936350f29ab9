//! Palette data model.
//!
//! A [`Snapshot`] is the unit that flows through the whole system: the store
//! owns the current one, the durable backend persists it, the coordinator
//! hands it to woken readers and the HTTP layer renders its [`Palette`].

use std::net::IpAddr;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The configuration record served to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Palette {
    /// Upper-case hex color tokens, in display order.
    pub colors: Vec<String>,
    pub display_duration_ms: u32,
    pub fadeout_duration_ms: u32,
}

impl Palette {
    /// Built-in palette installed when nothing has ever been stored.
    pub fn builtin_default() -> Self {
        Self {
            colors: vec!["FFFFFF".to_string(), "FF00FF".to_string()],
            display_duration_ms: 1000,
            fadeout_duration_ms: 1000,
        }
    }
}

/// Strictly increasing identifier assigned to every accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of the first snapshot a fresh store materialises.
    pub const INITIAL: Version = Version(1);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The version assigned to the write following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Version)
    }
}

/// Who issued a write. Informational only; reads never depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Stable identifier derived from the user agent and address.
    pub client_id: Uuid,
    pub user_agent: Option<String>,
    pub address: Option<IpAddr>,
}

impl Provenance {
    pub fn new(user_agent: Option<String>, address: Option<IpAddr>) -> Self {
        let mut key = Vec::new();
        key.extend_from_slice(user_agent.as_deref().unwrap_or_default().as_bytes());
        key.push(0);
        if let Some(addr) = address {
            key.extend_from_slice(addr.to_string().as_bytes());
        }

        Self {
            client_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, &key),
            user_agent,
            address,
        }
    }
}

/// A palette together with the version it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub palette: Palette,
    pub version: Version,
    /// Wall-clock time of the write, milliseconds since the Unix epoch.
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Snapshot {
    /// The built-in default at [`Version::INITIAL`].
    pub fn initial() -> Self {
        Self {
            palette: Palette::builtin_default(),
            version: Version::INITIAL,
            updated_at_ms: now_ms(),
            provenance: None,
        }
    }

    /// Build the snapshot that supersedes `self`.
    pub fn successor(&self, palette: Palette, provenance: Option<Provenance>) -> Self {
        Self {
            palette,
            version: self.version.next(),
            updated_at_ms: now_ms(),
            provenance,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
