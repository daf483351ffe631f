//! Gift lifecycle state machine.
//!
//! A gift moves through `Pending → Reserved → Purchased → Delivered → Received`
//! one step at a time. `Received` is terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    points::{self, price_to_points, ResolvedPoints, ValuationMode},
    Gift, WishlistItem,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GiftStatus {
    Pending,
    Reserved,
    Purchased,
    Delivered,
    Received,
}

impl GiftStatus {
    /// The only status this one may move to
    pub fn next(self) -> Option<GiftStatus> {
        match self {
            GiftStatus::Pending => Some(GiftStatus::Reserved),
            GiftStatus::Reserved => Some(GiftStatus::Purchased),
            GiftStatus::Purchased => Some(GiftStatus::Delivered),
            GiftStatus::Delivered => Some(GiftStatus::Received),
            GiftStatus::Received => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GiftStatus::Pending => "PENDING",
            GiftStatus::Reserved => "RESERVED",
            GiftStatus::Purchased => "PURCHASED",
            GiftStatus::Delivered => "DELIVERED",
            GiftStatus::Received => "RECEIVED",
        }
    }

    /// Check that `to` directly follows this status
    pub fn ensure_next(self, to: GiftStatus) -> Result<(), TransitionError> {
        if self.next() == Some(to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for GiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move gift from {from} to {to}")]
    InvalidTransition { from: GiftStatus, to: GiftStatus },

    /// Archived wishlist items cannot be reserved
    #[error("wishlist item is archived")]
    Archived,

    /// Sentiment-valued spaces need the recipient to pick a number of points
    #[error("sentimentPoints must be a non-negative integer")]
    SentimentRequired,
}

impl Gift {
    pub fn reserve(
        &mut self,
        item: &WishlistItem,
        giver_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.status.ensure_next(GiftStatus::Reserved)?;
        if item.archived {
            return Err(TransitionError::Archived);
        }

        self.giver_id = Some(giver_id);
        self.reserved_at = Some(now);
        self.advance(GiftStatus::Reserved, now);
        Ok(())
    }

    /// Mark the gift as purchased
    ///
    /// An explicit price replaces any previously locked points. Otherwise the
    /// item's price is locked in, unless points were already locked.
    pub fn purchase(
        &mut self,
        item: &WishlistItem,
        price_cents: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.status.ensure_next(GiftStatus::Purchased)?;

        match price_cents {
            Some(price_cents) => {
                self.price_points_locked = Some(i64::from(price_to_points(price_cents)));
            }
            None if self.price_points_locked.is_none() => {
                self.price_points_locked = Some(item_price_points(item));
            }
            None => {}
        }

        self.purchased_at = Some(now);
        self.advance(GiftStatus::Purchased, now);
        Ok(())
    }

    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status.ensure_next(GiftStatus::Delivered)?;
        self.delivered_at = Some(now);
        self.advance(GiftStatus::Delivered, now);
        Ok(())
    }

    /// Mark the gift as received and work out how many points it is worth
    ///
    /// Nothing is modified when an error is returned.
    pub fn receive(
        &mut self,
        mode: ValuationMode,
        item: &WishlistItem,
        sentiment_points: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ResolvedPoints, TransitionError> {
        self.status.ensure_next(GiftStatus::Received)?;

        match mode {
            ValuationMode::Sentiment => {
                let value = sentiment_points
                    .filter(|points| *points >= 0)
                    .ok_or(TransitionError::SentimentRequired)?;
                self.sentiment_points = Some(value);
            }
            ValuationMode::Price => {
                if self.price_points_locked.is_none() {
                    self.price_points_locked = Some(item_price_points(item));
                }
            }
        }

        self.received_at = Some(now);
        self.advance(GiftStatus::Received, now);
        Ok(points::resolve(mode, self, item))
    }

    fn advance(&mut self, to: GiftStatus, now: DateTime<Utc>) {
        self.status = to;
        self.updated_at = now;
    }
}

fn item_price_points(item: &WishlistItem) -> i64 {
    i64::from(item.price_cents.map(price_to_points).unwrap_or(0))
}
