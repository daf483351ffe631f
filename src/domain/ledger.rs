//! Append-only points ledger.
//!
//! Balances are never stored: they are folded from the entries of a
//! `(space, user)` pair.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason recorded when a received gift credits its giver
pub const REASON_GIFT_RECEIVE: &str = "gift:receive";

/// Reason recorded when a reward redemption debits the redeemer
pub const REASON_REWARD_REDEEM: &str = "reward:redeem";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Credit,
    Debit,
}

/// Immutable ledger row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub space_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Always strictly positive. The direction comes from `entry_type`.
    pub points: u32,
    /// Short machine-readable tag such as `gift:receive`.
    ///
    /// Free text, so new kinds of credits and debits need no migration.
    pub reason: String,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed contribution of this entry to a balance
    pub fn delta(&self) -> i64 {
        match self.entry_type {
            EntryType::Credit => i64::from(self.points),
            EntryType::Debit => -i64::from(self.points),
        }
    }
}

/// Validated ledger entry that has not been stored yet
#[derive(Clone, Debug, PartialEq)]
pub struct NewLedgerEntry {
    pub space_id: Uuid,
    pub user_id: Uuid,
    pub entry_type: EntryType,
    pub points: u32,
    pub reason: String,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger entries need a positive number of points")]
    ZeroPoints,
    #[error("ledger entries need a reason")]
    MissingReason,
    #[error("ledger entries need a space and a user")]
    MissingId,
}

impl NewLedgerEntry {
    pub fn new(
        space_id: Uuid,
        user_id: Uuid,
        entry_type: EntryType,
        points: u32,
        reason: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        let reason = reason.into();
        if space_id.is_nil() || user_id.is_nil() {
            return Err(LedgerError::MissingId);
        }
        if points == 0 {
            return Err(LedgerError::ZeroPoints);
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::MissingReason);
        }

        Ok(Self {
            space_id,
            user_id,
            entry_type,
            points,
            reason,
            meta: None,
        })
    }

    pub fn credit(
        space_id: Uuid,
        user_id: Uuid,
        points: u32,
        reason: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Self::new(space_id, user_id, EntryType::Credit, points, reason)
    }

    pub fn debit(
        space_id: Uuid,
        user_id: Uuid,
        points: u32,
        reason: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Self::new(space_id, user_id, EntryType::Debit, points, reason)
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn into_entry(self, now: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            space_id: self.space_id,
            user_id: self.user_id,
            entry_type: self.entry_type,
            points: self.points,
            reason: self.reason,
            meta: self.meta,
            created_at: now,
        }
    }
}

/// Credits minus debits, floored at zero
pub fn balance<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> u32 {
    let total: i64 = entries.into_iter().map(LedgerEntry::delta).sum();
    u32::try_from(total.max(0)).unwrap_or(u32::MAX)
}

/// Sum of the balances of every user appearing in the entries
pub fn space_total<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> u64 {
    let mut per_user: HashMap<Uuid, Vec<&LedgerEntry>> = HashMap::new();
    for entry in entries {
        per_user.entry(entry.user_id).or_default().push(entry);
    }

    per_user
        .values()
        .map(|entries| u64::from(balance(entries.iter().copied())))
        .sum()
}
