//! Suppression entries

use crate::member::normalize_email;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an address is suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    HardBounce,
    RepeatedSoftBounce,
    Complaint,
    Unsubscribe,
    Manual,
}

impl SuppressionReason {
    pub const ALL: [SuppressionReason; 5] = [
        SuppressionReason::HardBounce,
        SuppressionReason::RepeatedSoftBounce,
        SuppressionReason::Complaint,
        SuppressionReason::Unsubscribe,
        SuppressionReason::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressionReason::HardBounce => "hard_bounce",
            SuppressionReason::RepeatedSoftBounce => "repeated_soft_bounce",
            SuppressionReason::Complaint => "complaint",
            SuppressionReason::Unsubscribe => "unsubscribe",
            SuppressionReason::Manual => "manual",
        }
    }
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-address suppression / bounce state
///
/// An entry with `reason == None` only tracks soft bounces and does not
/// suppress. Suppressed entries with an `expires_at` in the past no longer
/// suppress either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub email: String,
    #[serde(default)]
    pub reason: Option<SuppressionReason>,
    #[serde(default)]
    pub bounce_count: u32,
    #[serde(default)]
    pub last_bounce_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suppressed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SuppressionEntry {
    /// Clean entry for an address
    pub fn new(email: &str) -> Self {
        Self {
            email: normalize_email(email),
            reason: None,
            bounce_count: 0,
            last_bounce_at: None,
            suppressed_at: None,
            expires_at: None,
        }
    }

    pub fn suppressed(email: &str, reason: SuppressionReason, at: DateTime<Utc>) -> Self {
        let mut entry = Self::new(email);
        entry.reason = Some(reason);
        entry.suppressed_at = Some(at);
        entry
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Whether the address is blocked at `now`
    pub fn is_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.reason.is_some() && !self.is_expired(now)
    }
}
