use crate::{
    domain::{
        ledger, Gift, GiftStatus, LedgerEntry, NewLedgerEntry, Reward, RewardRedemption, Space,
        SpaceMember, WishlistItem,
    },
    ports::database::{ArchiveOutcome, DatabasePort, Error, GiftContext, UniqueField},
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// In-memory store
///
/// Every method runs under a single lock, which gives the `commit_*` units of
/// work the same all-or-nothing behaviour as a database transaction.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    spaces: HashMap<Uuid, Space>,
    members: HashMap<(Uuid, Uuid), SpaceMember>,
    items: HashMap<Uuid, WishlistItem>,
    gifts: HashMap<Uuid, Gift>,
    rewards: HashMap<Uuid, Reward>,
    redemptions: Vec<RewardRedemption>,
    ledger: Vec<LedgerEntry>,
}

impl State {
    fn user_entries(
        &self,
        space_id: Uuid,
        user_id: Uuid,
    ) -> impl DoubleEndedIterator<Item = &LedgerEntry> + '_ {
        self.ledger
            .iter()
            .filter(move |entry| entry.space_id == space_id && entry.user_id == user_id)
    }

    fn check_gift(&self, gift: &Gift, expected: GiftStatus) -> Result<(), Error> {
        match self.gifts.get(&gift.id) {
            None => Err(Error::MissingRecord(gift.id)),
            Some(stored) if stored.status != expected => Err(Error::StaleGift {
                gift_id: gift.id,
                expected,
            }),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DatabasePort for MemoryDatabase {
    async fn insert_space(&self, space: Space, owner: SpaceMember) -> Result<Space, Error> {
        let mut state = self.state.lock()?;

        for existing in state.spaces.values() {
            if existing.join_code == space.join_code {
                return Err(Error::UniqueViolation(UniqueField::JoinCode));
            }
            if existing.invite_code == space.invite_code {
                return Err(Error::UniqueViolation(UniqueField::InviteCode));
            }
        }

        state
            .members
            .insert((owner.space_id, owner.user_id), owner);
        state.spaces.insert(space.id, space.clone());
        Ok(space)
    }

    async fn join_code_exists(&self, join_code: String) -> Result<bool, Error> {
        let state = self.state.lock()?;
        Ok(state.spaces.values().any(|space| space.join_code == join_code))
    }

    async fn get_space(&self, space_id: Uuid) -> Result<Option<Space>, Error> {
        Ok(self.state.lock()?.spaces.get(&space_id).cloned())
    }

    async fn find_space_by_join_code(&self, join_code: String) -> Result<Option<Space>, Error> {
        let state = self.state.lock()?;
        Ok(state
            .spaces
            .values()
            .find(|space| space.join_code == join_code)
            .cloned())
    }

    async fn add_member(&self, member: SpaceMember) -> Result<SpaceMember, Error> {
        let mut state = self.state.lock()?;
        if !state.spaces.contains_key(&member.space_id) {
            return Err(Error::MissingRecord(member.space_id));
        }

        let stored = state
            .members
            .entry((member.space_id, member.user_id))
            .or_insert(member);
        Ok(stored.clone())
    }

    async fn insert_wishlist_item(&self, item: WishlistItem, gift: Gift) -> Result<(), Error> {
        let mut state = self.state.lock()?;
        if !state.spaces.contains_key(&item.space_id) {
            return Err(Error::MissingRecord(item.space_id));
        }

        state.gifts.insert(gift.id, gift);
        state.items.insert(item.id, item);
        Ok(())
    }

    async fn delete_wishlist_item(&self, item_id: Uuid) -> Result<bool, Error> {
        let mut state = self.state.lock()?;
        if state.items.remove(&item_id).is_none() {
            return Ok(false);
        }

        state.gifts.retain(|_, gift| gift.wishlist_item_id != item_id);
        Ok(true)
    }

    async fn archive_wishlist_items(
        &self,
        item_ids: Vec<Uuid>,
        archived_at: DateTime<Utc>,
    ) -> Result<ArchiveOutcome, Error> {
        let mut state = self.state.lock()?;
        let mut outcome = ArchiveOutcome::default();

        for item_id in item_ids {
            match state.items.get_mut(&item_id) {
                Some(item) => {
                    if item.archive(archived_at) {
                        outcome.updated_count += 1;
                    }
                }
                None => {
                    if !outcome.not_found.contains(&item_id) {
                        outcome.not_found.push(item_id);
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn get_gift_context(&self, gift_id: Uuid) -> Result<Option<GiftContext>, Error> {
        let state = self.state.lock()?;

        let Some(gift) = state.gifts.get(&gift_id) else {
            return Ok(None);
        };
        let item = state
            .items
            .get(&gift.wishlist_item_id)
            .ok_or(Error::MissingRecord(gift.wishlist_item_id))?;
        let space = state
            .spaces
            .get(&item.space_id)
            .ok_or(Error::MissingRecord(item.space_id))?;

        Ok(Some(GiftContext {
            gift: gift.clone(),
            item: item.clone(),
            space: space.clone(),
        }))
    }

    async fn update_gift(&self, gift: Gift, expected: GiftStatus) -> Result<Gift, Error> {
        let mut state = self.state.lock()?;
        state.check_gift(&gift, expected)?;

        state.gifts.insert(gift.id, gift.clone());
        Ok(gift)
    }

    async fn commit_gift_receipt(
        &self,
        gift: Gift,
        expected: GiftStatus,
        credit: Option<NewLedgerEntry>,
    ) -> Result<Option<LedgerEntry>, Error> {
        let mut state = self.state.lock()?;
        // All checks happen before the first write
        state.check_gift(&gift, expected)?;

        let entry = credit.map(|credit| credit.into_entry(Utc::now()));
        if let Some(entry) = &entry {
            state.ledger.push(entry.clone());
        }
        state.gifts.insert(gift.id, gift);

        Ok(entry)
    }

    async fn insert_reward(&self, reward: Reward) -> Result<Reward, Error> {
        let mut state = self.state.lock()?;
        if !state.spaces.contains_key(&reward.space_id) {
            return Err(Error::MissingRecord(reward.space_id));
        }

        state.rewards.insert(reward.id, reward.clone());
        Ok(reward)
    }

    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, Error> {
        Ok(self.state.lock()?.rewards.get(&reward_id).cloned())
    }

    async fn list_rewards(&self, space_id: Uuid) -> Result<Vec<Reward>, Error> {
        let state = self.state.lock()?;
        let mut rewards: Vec<Reward> = state
            .rewards
            .values()
            .filter(|reward| reward.space_id == space_id)
            .cloned()
            .collect();
        rewards.sort_by_key(|reward| reward.created_at);
        Ok(rewards)
    }

    async fn update_reward(&self, reward: Reward) -> Result<Reward, Error> {
        let mut state = self.state.lock()?;
        let stored = state
            .rewards
            .get_mut(&reward.id)
            .ok_or(Error::MissingRecord(reward.id))?;
        *stored = reward.clone();
        Ok(reward)
    }

    async fn delete_reward(&self, reward_id: Uuid) -> Result<bool, Error> {
        Ok(self.state.lock()?.rewards.remove(&reward_id).is_some())
    }

    async fn commit_redemption(
        &self,
        redemption: RewardRedemption,
        debit: NewLedgerEntry,
    ) -> Result<LedgerEntry, Error> {
        let mut state = self.state.lock()?;

        let balance = ledger::balance(state.user_entries(debit.space_id, debit.user_id));
        if balance < debit.points {
            return Err(Error::InsufficientBalance {
                balance,
                required: debit.points,
            });
        }

        let entry = debit.into_entry(Utc::now());
        state.redemptions.push(redemption);
        state.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn list_redemptions(&self, space_id: Uuid) -> Result<Vec<RewardRedemption>, Error> {
        let state = self.state.lock()?;
        Ok(state
            .redemptions
            .iter()
            .filter(|redemption| redemption.space_id == space_id)
            .cloned()
            .collect())
    }

    async fn append_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, Error> {
        let entry = entry.into_entry(Utc::now());
        self.state.lock()?.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn ledger_entries(
        &self,
        space_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, Error> {
        let state = self.state.lock()?;
        // Entries are stored in insertion order
        Ok(state.user_entries(space_id, user_id).rev().cloned().collect())
    }

    async fn space_ledger(&self, space_id: Uuid) -> Result<Vec<LedgerEntry>, Error> {
        let state = self.state.lock()?;
        Ok(state
            .ledger
            .iter()
            .filter(|entry| entry.space_id == space_id)
            .cloned()
            .collect())
    }

    async fn balance(&self, space_id: Uuid, user_id: Uuid) -> Result<u32, Error> {
        let state = self.state.lock()?;
        Ok(ledger::balance(state.user_entries(space_id, user_id)))
    }
}

/// Message of a [`PoisonError`] whose guard has been dropped
///
/// Shared by the in-memory adapters. A poisoned lock means a writer panicked
/// halfway, so callers only ever see it as an adapter failure.
#[derive(Debug, thiserror::Error)]
#[error("in-memory state lock poisoned: {0}")]
pub struct ErasedPoisonError(pub(crate) String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
