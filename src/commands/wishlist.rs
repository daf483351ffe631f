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
        points::price_to_points, ActivityType, Gift, NewActivity, ValuationMode, WishlistItem,
    },
    ports::{
        activity::ActivityPort, database::DatabasePort, member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{activity::record_activity, DomainLogic, Error};

/// Add an item to a space's wishlist, together with its pending gift
pub struct AddWishlistItemRequest {
    pub space_id: Uuid,
    pub actor_id: Uuid,
    pub title: String,
    pub price_cents: Option<i64>,
    /// Value chosen up front in a sentiment space. Ignored in price spaces.
    pub points: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistItemResponse {
    pub item: WishlistItem,
    pub gift: Gift,
}

/// Delete an item and its gift
///
/// Ledger entries that mention the gift are kept.
pub struct DeleteWishlistItemRequest {
    pub item_id: Uuid,
}

pub struct BulkArchiveRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkArchiveResponse {
    /// Items archived by this call. Already archived items are not counted.
    pub updated_count: usize,
    /// Ids as requested
    pub ids: Vec<Uuid>,
    pub not_found: Vec<Uuid>,
}

impl<D, M, A, L> Service<AddWishlistItemRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = AddWishlistItemResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: AddWishlistItemRequest) -> Self::Future {
        let database = self.database.clone();
        let activity = self.activity.clone();
        Box::pin(async move {
            let title = req.title.trim();
            if title.is_empty() {
                return Err(Error::BadRequest("title is required".into()));
            }
            if matches!(req.price_cents, Some(price) if price < 0) {
                return Err(Error::BadRequest("priceCents must not be negative".into()));
            }
            let space = database
                .get_space(req.space_id)
                .await?
                .ok_or_else(|| Error::NotFound("Space not found.".into()))?;

            let now = Utc::now();
            let item = WishlistItem::new(req.space_id, title, req.price_cents, now);
            let mut gift = Gift::new(item.id, now);
            match space.valuation_mode {
                ValuationMode::Price => {
                    let price = req
                        .price_cents
                        .ok_or_else(|| Error::BadRequest("price is required".into()))?;
                    gift.price_points_locked = Some(i64::from(price_to_points(price)));
                }
                ValuationMode::Sentiment => {
                    if matches!(req.points, Some(points) if points < 0) {
                        return Err(Error::BadRequest("points must not be negative".into()));
                    }
                    gift.sentiment_points = req.points;
                }
            }
            database
                .insert_wishlist_item(item.clone(), gift.clone())
                .await?;

            tracing::info!(
                space_id = %item.space_id,
                item_id = %item.id,
                gift_id = %gift.id,
                "wishlist item added"
            );
            record_activity(
                activity.as_ref(),
                NewActivity::new(item.space_id, req.actor_id, ActivityType::WishlistAdd)
                    .with_payload(serde_json::json!({
                        "wishlistItemId": item.id,
                        "title": item.title,
                    })),
            )
            .await;

            Ok(AddWishlistItemResponse { item, gift })
        })
    }
}

impl<D, M, A, L> Service<DeleteWishlistItemRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = ();
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DeleteWishlistItemRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            if !database.delete_wishlist_item(req.item_id).await? {
                return Err(Error::NotFound("Wishlist item not found.".into()));
            }
            tracing::info!(item_id = %req.item_id, "wishlist item deleted");
            Ok(())
        })
    }
}

impl<D, M, A, L> Service<BulkArchiveRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = BulkArchiveResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: BulkArchiveRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            if req.ids.is_empty() {
                return Err(Error::BadRequest("ids must be a non-empty array".into()));
            }

            let outcome = database
                .archive_wishlist_items(req.ids.clone(), Utc::now())
                .await?;
            tracing::info!(
                requested = req.ids.len(),
                updated = outcome.updated_count,
                missing = outcome.not_found.len(),
                "wishlist items archived"
            );

            Ok(BulkArchiveResponse {
                updated_count: outcome.updated_count,
                ids: req.ids,
                not_found: outcome.not_found,
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
            test_support::{memory_logic, seed_space, MemoryLogic},
            ErrorCode,
        },
        domain::{GiftStatus, Space, ValuationMode},
    };
    use rstest::*;
    use speculoos::prelude::*;
    use tower::BoxError;

    async fn add_item(
        domain: &mut MemoryLogic,
        space: &Space,
        title: &str,
    ) -> AddWishlistItemResponse {
        domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: title.to_string(),
                price_cents: Some(1500),
                points: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_creates_pending_gift() -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let activity = MemoryActivityLog::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database.clone(), activity.clone());

        // WHEN
        let res = domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: "  Coffee Grinder ".to_string(),
                price_cents: Some(2599),
                points: Some(80),
            })
            .await;

        // THEN
        assert_that!(res).is_ok().matches(|created| {
            created.item.title == "Coffee Grinder"
                && created.gift.wishlist_item_id == created.item.id
                && created.gift.status == GiftStatus::Pending
                && created.gift.price_points_locked == Some(26)
                && created.gift.sentiment_points.is_none()
        });
        let activities = activity.list(space.id).await?;
        assert_that!(activities).has_length(1);
        assert_that!(activities[0].activity_type).is_equal_to(ActivityType::WishlistAdd);

        Ok(())
    }

    #[rstest]
    #[case(ValuationMode::Price, "   ", Some(100), None)]
    #[case(ValuationMode::Price, "Camera", Some(-1), None)]
    #[case(ValuationMode::Sentiment, "Camera", None, Some(-5))]
    #[tokio::test]
    async fn test_add_rejects_invalid(
        #[case] mode: ValuationMode,
        #[case] title: &str,
        #[case] price_cents: Option<i64>,
        #[case] points: Option<i64>,
    ) -> Result<(), BoxError> {
        // GIVEN an empty space
        let database = MemoryDatabase::default();
        let space = seed_space(&database, mode).await;
        let activity = MemoryActivityLog::default();
        let mut domain = memory_logic(database, activity.clone());

        // WHEN an item with bad input is added
        let res = domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: title.to_string(),
                price_cents,
                points,
            })
            .await;

        // THEN nothing is stored
        assert_that!(res)
            .is_err()
            .matches(|err| err.code() == ErrorCode::BadRequest);
        assert_that!(activity.list(space.id).await?).is_empty();

        Ok(())
    }

    #[tokio::test]
    async fn test_sentiment_space_stores_points() -> Result<(), BoxError> {
        // GIVEN a sentiment space
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Sentiment).await;
        let mut domain = memory_logic(database, MemoryActivityLog::default());

        // WHEN an item is added with a chosen value and a price
        let res = domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: "Picnic".to_string(),
                price_cents: Some(3920),
                points: Some(45),
            })
            .await;

        // THEN the value is kept and no price points are locked
        assert_that!(res).is_ok().matches(|created| {
            created.gift.sentiment_points == Some(45)
                && created.gift.price_points_locked.is_none()
        });

        Ok(())
    }

    #[tokio::test]
    async fn test_price_space_locks_points() -> Result<(), BoxError> {
        // GIVEN a price space
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database, MemoryActivityLog::default());

        // WHEN an item is added with a price
        let res = domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: "Board game".to_string(),
                price_cents: Some(3920),
                points: None,
            })
            .await;

        // THEN its points are locked from the price
        assert_that!(res).is_ok().matches(|created| {
            created.gift.price_points_locked == Some(39) && created.gift.sentiment_points.is_none()
        });

        Ok(())
    }

    #[tokio::test]
    async fn test_price_space_requires_price() -> Result<(), BoxError> {
        // GIVEN a price space
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database, MemoryActivityLog::default());

        // WHEN an item is added without a price
        let res = domain
            .handle(AddWishlistItemRequest {
                space_id: space.id,
                actor_id: Uuid::new_v4(),
                title: "Mystery box".to_string(),
                price_cents: None,
                points: Some(10),
            })
            .await;

        // THEN it is rejected
        assert_that!(res).is_err().matches(|err| {
            err.status_code() == 400 && err.to_string() == "price is required"
        });

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_removes_gift() -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database.clone(), MemoryActivityLog::default());
        let created = add_item(&mut domain, &space, "Instant Camera").await;

        // WHEN
        let res = domain
            .handle(DeleteWishlistItemRequest {
                item_id: created.item.id,
            })
            .await;

        // THEN
        assert_that!(res).is_ok();
        assert_that!(database.get_gift_context(created.gift.id).await?).is_none();

        let res = domain
            .handle(DeleteWishlistItemRequest {
                item_id: created.item.id,
            })
            .await;
        assert_that!(res).is_err().matches(|err| {
            err.code() == ErrorCode::NotFound && err.to_string() == "Wishlist item not found."
        });

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_archive_reports_missing() -> Result<(), BoxError> {
        // GIVEN
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database.clone(), MemoryActivityLog::default());
        let first = add_item(&mut domain, &space, "Camera").await;
        let second = add_item(&mut domain, &space, "Headphones").await;
        let third = add_item(&mut domain, &space, "Notebook").await;
        let missing = Uuid::new_v4();
        let ids = vec![first.item.id, second.item.id, missing];

        // WHEN
        let res = domain.handle(BulkArchiveRequest { ids: ids.clone() }).await;

        // THEN
        assert_that!(res).is_ok().is_equal_to(BulkArchiveResponse {
            updated_count: 2,
            ids,
            not_found: vec![missing],
        });
        let archived = |gift_id| {
            let database = database.clone();
            async move {
                let ctx = database.get_gift_context(gift_id).await.unwrap().unwrap();
                (ctx.item.archived, ctx.item.archived_at.is_some())
            }
        };
        assert_that!(archived(first.gift.id).await).is_equal_to((true, true));
        assert_that!(archived(second.gift.id).await).is_equal_to((true, true));
        assert_that!(archived(third.gift.id).await).is_equal_to((false, false));

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_archive_is_idempotent() -> Result<(), BoxError> {
        let database = MemoryDatabase::default();
        let space = seed_space(&database, ValuationMode::Price).await;
        let mut domain = memory_logic(database, MemoryActivityLog::default());
        let item = add_item(&mut domain, &space, "Sketchbook").await.item;

        let first = domain.handle(BulkArchiveRequest { ids: vec![item.id] }).await?;
        let second = domain.handle(BulkArchiveRequest { ids: vec![item.id] }).await?;

        assert_that!(first.updated_count).is_equal_to(1);
        assert_that!(second.updated_count).is_equal_to(0);
        assert_that!(second.not_found).is_empty();

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_archive_requires_ids() {
        // GIVEN
        let mut domain = memory_logic(MemoryDatabase::default(), MemoryActivityLog::default());

        // WHEN
        let res = domain.handle(BulkArchiveRequest { ids: vec![] }).await;

        // THEN
        assert_that!(res).is_err().matches(|err| {
            err.status_code() == 400 && err.to_string().contains("ids must be a non-empty array")
        });
    }
}
