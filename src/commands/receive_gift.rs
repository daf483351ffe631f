use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use serde::Serialize;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        ledger::REASON_GIFT_RECEIVE, ActivityType, GiftStatus, NewActivity, NewLedgerEntry,
        ValuationMode,
    },
    ports::{
        activity::ActivityPort,
        database::{DatabasePort, GiftContext},
        member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{activity::record_activity, gift_lifecycle::load_gift, DomainLogic, Error};

pub struct ReceiveGiftRequest {
    pub gift_id: Uuid,
    /// Authenticated user confirming the gift arrived
    pub actor_id: Uuid,
    /// Required in sentiment-valued spaces, ignored otherwise
    pub sentiment_points: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveGiftResponse {
    pub gift_id: Uuid,
    pub status: GiftStatus,
    pub points_awarded: u32,
    pub mode: ValuationMode,
}

impl<D, M, A, L> Service<ReceiveGiftRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = ReceiveGiftResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ReceiveGiftRequest) -> Self::Future {
        let database = self.database.clone();
        let activity = self.activity.clone();
        Box::pin(async move {
            // Fetch necessary data
            let GiftContext {
                mut gift,
                item,
                space,
            } = load_gift(database.as_ref(), req.gift_id).await?;
            let previous = gift.status;

            // Move the gift and value it. Nothing is stored yet.
            let resolved = gift.receive(
                space.valuation_mode,
                &item,
                req.sentiment_points,
                Utc::now(),
            )?;

            let credit = if resolved.points > 0 {
                let recipient = gift.giver_id.unwrap_or(req.actor_id);
                let entry = NewLedgerEntry::credit(
                    space.id,
                    recipient,
                    resolved.points,
                    REASON_GIFT_RECEIVE,
                )?
                .with_meta(serde_json::json!({
                    "giftId": gift.id,
                    "wishlistItemId": item.id,
                }));
                Some(entry)
            } else {
                None
            };

            // Gift update and credit are stored together or not at all
            let gift_id = gift.id;
            let entry = database
                .commit_gift_receipt(gift, previous, credit)
                .await?;

            tracing::info!(
                gift_id = %gift_id,
                space_id = %space.id,
                points = resolved.points,
                mode = %resolved.mode,
                credited = ?entry.as_ref().map(|entry| entry.user_id),
                "gift received"
            );

            record_activity(
                activity.as_ref(),
                NewActivity::new(space.id, req.actor_id, ActivityType::GiftReceive).with_payload(
                    serde_json::json!({
                        "giftId": gift_id,
                        "title": item.title,
                        "pointsAwarded": resolved.points,
                    }),
                ),
            )
            .await;

            Ok(ReceiveGiftResponse {
                gift_id,
                status: GiftStatus::Received,
                points_awarded: resolved.points,
                mode: resolved.mode,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{activity::memory::MemoryActivityLog, database::memory::MemoryDatabase},
        commands::{
            gift_lifecycle::{DeliverGiftRequest, PurchaseGiftRequest, ReserveGiftRequest},
            test_support::{logic_with_activity, memory_logic, seed_space, MemoryLogic},
            wishlist::AddWishlistItemRequest,
            ErrorCode,
        },
        domain::{EntryType, Space},
        ports::activity::{self, MockActivityPort},
    };
    use rstest::*;
    use speculoos::prelude::*;
    use tower::BoxError;

    /// Add an item and move its gift up to `Delivered`
    async fn delivered_gift(
        domain: &mut MemoryLogic,
        space: &Space,
        giver_id: Uuid,
        price_cents: Option<i64>,
    ) -> Result<Uuid, BoxError> {
        let created = domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: "Coffee Grinder".to_string(),
                price_cents,
                points: None,
            })
            .await?;
        let gift_id = created.gift.id;
        domain
            .handle(ReserveGiftRequest { gift_id, giver_id })
            .await?;
        domain
            .handle(PurchaseGiftRequest {
                gift_id,
                price_cents: None,
            })
            .await?;
        domain.handle(DeliverGiftRequest { gift_id }).await?;
        Ok(gift_id)
    }

    #[fixture]
    fn giver_id() -> Uuid {
        Uuid::new_v4()
    }

    #[rstest]
    #[tokio::test]
    async fn test_price_receive_credits_giver(giver_id: Uuid) -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database.clone(), MemoryActivityLog::default());
        let gift_id = delivered_gift(&mut domain, &space, giver_id, Some(2599)).await?;

        // WHEN
        let res = domain
            .handle(ReceiveGiftRequest {
                gift_id,
                actor_id: Uuid::new_v4(),
                sentiment_points: None,
            })
            .await;

        // THEN
        assert_that!(res).is_ok().is_equal_to(ReceiveGiftResponse {
            gift_id,
            status: GiftStatus::Received,
            points_awarded: 26,
            mode: ValuationMode::Price,
        });
        let entries = database.ledger_entries(space.id, giver_id).await?;
        assert_that!(entries).has_length(1);
        assert_that!(entries[0].entry_type).is_equal_to(EntryType::Credit);
        assert_that!(entries[0].points).is_equal_to(26);
        assert_that!(entries[0].reason.as_str()).is_equal_to(REASON_GIFT_RECEIVE);
        assert_that!(entries[0].meta)
            .is_some()
            .matches(|meta| meta["giftId"] == serde_json::json!(gift_id));

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_sentiment_gate(giver_id: Uuid) -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Sentiment).await;
        let mut domain = memory_logic(database.clone(), MemoryActivityLog::default());
        let gift_id = delivered_gift(&mut domain, &space, giver_id, None).await?;

        // WHEN receiving without sentiment points
        let res = domain
            .handle(ReceiveGiftRequest {
                gift_id,
                actor_id: Uuid::new_v4(),
                sentiment_points: None,
            })
            .await;

        // THEN it fails without touching anything
        assert_that!(res)
            .is_err()
            .matches(|err| err.code() == ErrorCode::BadRequest && err.status_code() == 400);
        let stored = database.get_gift_context(gift_id).await?.unwrap().gift;
        assert_that!(stored.status).is_equal_to(GiftStatus::Delivered);
        assert_that!(database.space_ledger(space.id).await?).is_empty();

        let res = domain
            .handle(ReceiveGiftRequest {
                gift_id,
                actor_id: Uuid::new_v4(),
                sentiment_points: Some(17),
            })
            .await;
        assert_that!(res)
            .is_ok()
            .matches(|res| res.points_awarded == 17 && res.mode == ValuationMode::Sentiment);
        assert_that!(database.balance(space.id, giver_id).await?).is_equal_to(17);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_zero_points_writes_no_entry(giver_id: Uuid) -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database.clone(), MemoryActivityLog::default());
        let gift_id = delivered_gift(&mut domain, &space, giver_id, Some(0)).await?;

        // WHEN
        let res = domain
            .handle(ReceiveGiftRequest {
                gift_id,
                actor_id: Uuid::new_v4(),
                sentiment_points: None,
            })
            .await;

        // THEN
        assert_that!(res)
            .is_ok()
            .matches(|res| res.points_awarded == 0 && res.status == GiftStatus::Received);
        assert_that!(database.space_ledger(space.id).await?).is_empty();
        assert_that!(database.balance(space.id, giver_id).await?).is_equal_to(0);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_receive_twice(giver_id: Uuid) -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database.clone(), MemoryActivityLog::default());
        let gift_id = delivered_gift(&mut domain, &space, giver_id, Some(1000)).await?;
        let req = || ReceiveGiftRequest {
            gift_id,
            actor_id: giver_id,
            sentiment_points: None,
        };

        domain.handle(req()).await?;
        // WHEN
        let res = domain.handle(req()).await;

        // THEN
        assert_that!(res)
            .is_err()
            .matches(|err| err.code() == ErrorCode::InvalidTransition);
        assert_that!(database.balance(space.id, giver_id).await?).is_equal_to(10);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_activity_failure_is_swallowed(giver_id: Uuid) -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut seeding = memory_logic(database.clone(), MemoryActivityLog::default());
        let gift_id = delivered_gift(&mut seeding, &space, giver_id, Some(500)).await?;

        let mut failing = MockActivityPort::new();
        failing
            .expect_record()
            .returning(|_| Err(activity::Error::Adapter("feed offline".into())));
        let mut domain = logic_with_activity(database.clone(), failing);

        // WHEN
        let res = domain
            .handle(ReceiveGiftRequest {
                gift_id,
                actor_id: Uuid::new_v4(),
                sentiment_points: None,
            })
            .await;

        // THEN
        assert_that!(res)
            .is_ok()
            .matches(|res| res.points_awarded == 5);
        assert_that!(database.balance(space.id, giver_id).await?).is_equal_to(5);

        Ok(())
    }
}
