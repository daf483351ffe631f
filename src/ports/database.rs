use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Gift, GiftStatus, LedgerEntry, NewLedgerEntry, Reward, RewardRedemption, Space, SpaceMember,
    WishlistItem,
};

/// Persistence for spaces, gifts, rewards and the points ledger
///
/// Methods named `commit_*` are units of work: the adapter must apply all of
/// their writes or none of them.
#[mockall::automock]
#[async_trait::async_trait]
pub trait DatabasePort {
    /// Insert a new space together with its owner membership
    ///
    /// Fails with [`Error::UniqueViolation`] if either code is already taken.
    async fn insert_space(&self, space: Space, owner: SpaceMember) -> Result<Space, Error>;
    async fn join_code_exists(&self, join_code: String) -> Result<bool, Error>;
    async fn get_space(&self, space_id: Uuid) -> Result<Option<Space>, Error>;
    async fn find_space_by_join_code(&self, join_code: String) -> Result<Option<Space>, Error>;
    /// Add a member, returning the existing membership if there is one
    async fn add_member(&self, member: SpaceMember) -> Result<SpaceMember, Error>;

    async fn insert_wishlist_item(&self, item: WishlistItem, gift: Gift) -> Result<(), Error>;
    /// Delete an item and its gift. Returns `false` if the item does not exist.
    async fn delete_wishlist_item(&self, item_id: Uuid) -> Result<bool, Error>;
    async fn archive_wishlist_items(
        &self,
        item_ids: Vec<Uuid>,
        archived_at: DateTime<Utc>,
    ) -> Result<ArchiveOutcome, Error>;

    async fn get_gift_context(&self, gift_id: Uuid) -> Result<Option<GiftContext>, Error>;
    /// Store a gift if its stored status is still `expected`
    async fn update_gift(&self, gift: Gift, expected: GiftStatus) -> Result<Gift, Error>;
    /// Store a received gift and its optional credit entry
    async fn commit_gift_receipt(
        &self,
        gift: Gift,
        expected: GiftStatus,
        credit: Option<NewLedgerEntry>,
    ) -> Result<Option<LedgerEntry>, Error>;

    async fn insert_reward(&self, reward: Reward) -> Result<Reward, Error>;
    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, Error>;
    /// Rewards of a space, oldest first
    async fn list_rewards(&self, space_id: Uuid) -> Result<Vec<Reward>, Error>;
    /// Replace a stored reward. Fails with [`Error::MissingRecord`] if it is gone.
    async fn update_reward(&self, reward: Reward) -> Result<Reward, Error>;
    /// Remove a reward from the catalog
    ///
    /// Past redemptions and their debits are kept. Returns `false` if the
    /// reward does not exist.
    async fn delete_reward(&self, reward_id: Uuid) -> Result<bool, Error>;
    /// Store a redemption and the debit paying for it
    ///
    /// The redeemer's balance is checked again inside the unit of work and the
    /// call fails with [`Error::InsufficientBalance`] if it no longer covers
    /// the debit.
    async fn commit_redemption(
        &self,
        redemption: RewardRedemption,
        debit: NewLedgerEntry,
    ) -> Result<LedgerEntry, Error>;
    async fn list_redemptions(&self, space_id: Uuid) -> Result<Vec<RewardRedemption>, Error>;

    async fn append_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, Error>;
    /// Entries of a user in a space, newest first
    async fn ledger_entries(&self, space_id: Uuid, user_id: Uuid)
        -> Result<Vec<LedgerEntry>, Error>;
    async fn space_ledger(&self, space_id: Uuid) -> Result<Vec<LedgerEntry>, Error>;
    async fn balance(&self, space_id: Uuid, user_id: Uuid) -> Result<u32, Error>;
}

/// A gift loaded with the records needed to move it along its lifecycle
#[derive(Clone, Debug, PartialEq)]
pub struct GiftContext {
    pub gift: Gift,
    pub item: WishlistItem,
    pub space: Space,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// Items that were not archived before the call
    pub updated_count: usize,
    pub not_found: Vec<Uuid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniqueField {
    JoinCode,
    InviteCode,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::JoinCode => f.write_str("join code"),
            UniqueField::InviteCode => f.write_str("invite code"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A unique constraint rejected the write
    #[error("{0} is already taken")]
    UniqueViolation(UniqueField),

    /// The gift was moved by someone else since it was loaded
    #[error("gift {gift_id} is no longer {expected}")]
    StaleGift { gift_id: Uuid, expected: GiftStatus },

    /// A record the write depends on does not exist
    #[error("{0} does not exist")]
    MissingRecord(Uuid),

    /// Trying to remove too many points
    ///
    /// This would result in a negative balance, which is not supported.
    #[error("not enough points: balance {balance}, required {required}")]
    InsufficientBalance { balance: u32, required: u32 },

    /// Storage failure unrelated to the gift space rules, e.g. a lost connection
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
