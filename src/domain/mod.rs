use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod codes;
pub mod ledger;
pub mod lifecycle;
pub mod points;

pub use ledger::{EntryType, LedgerEntry, LedgerError, NewLedgerEntry};
pub use lifecycle::{GiftStatus, TransitionError};
pub use points::{ResolvedPoints, ValuationMode};

/// A shared space whose members exchange gifts and rewards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: Uuid,
    pub name: String,
    /// How received gifts are turned into points
    pub valuation_mode: ValuationMode,
    /// Short code members type to join the space
    pub join_code: String,
    /// Longer code embedded in shared invite links
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Owner,
    Member,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceMember {
    pub space_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl SpaceMember {
    pub fn new(space_id: Uuid, user_id: Uuid, role: MemberRole, now: DateTime<Utc>) -> Self {
        Self {
            space_id,
            user_id,
            role,
            joined_at: now,
        }
    }
}

/// Something a member of the space would like to receive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: Uuid,
    pub space_id: Uuid,
    pub title: String,
    /// Price in cents, when known
    pub price_cents: Option<i64>,
    /// Archived items stay visible in history but can no longer be reserved.
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WishlistItem {
    pub fn new(
        space_id: Uuid,
        title: impl Into<String>,
        price_cents: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            space_id,
            title: title.into(),
            price_cents,
            archived: false,
            archived_at: None,
            created_at: now,
        }
    }

    /// Archive the item.
    ///
    /// Returns `false` if the item was already archived, in which case the
    /// original `archived_at` is kept.
    pub fn archive(&mut self, now: DateTime<Utc>) -> bool {
        if self.archived {
            return false;
        }
        self.archived = true;
        self.archived_at = Some(now);
        true
    }
}

/// The gift attached to a [`WishlistItem`]
///
/// The lifecycle transitions are implemented in [`lifecycle`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: Uuid,
    pub wishlist_item_id: Uuid,
    /// Member who reserved the gift
    pub giver_id: Option<Uuid>,
    pub status: GiftStatus,
    /// Points chosen by the recipient in sentiment-valued spaces
    pub sentiment_points: Option<i64>,
    /// Points fixed from the price paid, once known
    pub price_points_locked: Option<i64>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub purchased_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Gift {
    pub fn new(wishlist_item_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            wishlist_item_id,
            giver_id: None,
            status: GiftStatus::Pending,
            sentiment_points: None,
            price_points_locked: None,
            reserved_at: None,
            purchased_at: None,
            delivered_at: None,
            received_at: None,
            updated_at: now,
        }
    }
}

/// Entry of the space's reward catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: Uuid,
    pub space_id: Uuid,
    /// Member who offers the reward. They cannot redeem it themselves.
    pub owner_id: Uuid,
    pub title: String,
    /// Cost in points
    pub points: u32,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    Pending,
    Redeemed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRedemption {
    pub id: Uuid,
    pub space_id: Uuid,
    pub reward_id: Uuid,
    pub redeemer_id: Uuid,
    /// Fulfilment happens outside this service, so new redemptions stay `Pending`.
    pub status: RedemptionStatus,
    pub created_at: DateTime<Utc>,
}

impl RewardRedemption {
    pub fn pending(reward: &Reward, redeemer_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            space_id: reward.space_id,
            reward_id: reward.id,
            redeemer_id,
            status: RedemptionStatus::Pending,
            created_at: now,
        }
    }
}

/// Kind of user-visible event shown in the space's activity feed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    WishlistAdd,
    GiftReceive,
    RewardAdd,
    RewardRedeem,
    MemberJoin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub space_id: Uuid,
    pub actor_id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewActivity {
    pub space_id: Uuid,
    pub actor_id: Uuid,
    pub activity_type: ActivityType,
    pub payload: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn new(space_id: Uuid, actor_id: Uuid, activity_type: ActivityType) -> Self {
        Self {
            space_id,
            actor_id,
            activity_type,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether both ids are set
    pub fn is_complete(&self) -> bool {
        !self.space_id.is_nil() && !self.actor_id.is_nil()
    }

    pub fn into_activity(self, now: DateTime<Utc>) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            space_id: self.space_id,
            actor_id: self.actor_id,
            activity_type: self.activity_type,
            payload: self.payload,
            created_at: now,
        }
    }
}
