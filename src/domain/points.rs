//! Conversion of received gifts into points.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Gift, WishlistItem};

/// How a space values received gifts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationMode {
    /// One point per whole currency unit of the gift's price
    Price,
    /// The recipient picks the number of points when receiving the gift
    Sentiment,
}

impl fmt::Display for ValuationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuationMode::Price => f.write_str("PRICE"),
            ValuationMode::Sentiment => f.write_str("SENTIMENT"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPoints {
    pub points: u32,
    pub mode: ValuationMode,
}

/// Convert a price in cents to whole points, rounding half up
///
/// Negative prices are worth nothing.
pub fn price_to_points(price_cents: i64) -> u32 {
    if price_cents <= 0 {
        return 0;
    }
    clamp_points(price_cents.saturating_add(50) / 100)
}

/// Number of points a gift is worth under the given valuation mode
pub fn resolve(mode: ValuationMode, gift: &Gift, item: &WishlistItem) -> ResolvedPoints {
    let points = match mode {
        ValuationMode::Sentiment => gift.sentiment_points.map(clamp_points).unwrap_or(0),
        ValuationMode::Price => match gift.price_points_locked {
            Some(locked) => clamp_points(locked),
            None => item.price_cents.map(price_to_points).unwrap_or(0),
        },
    };

    ResolvedPoints { points, mode }
}

fn clamp_points(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
