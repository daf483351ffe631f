//! End-to-end flows across several commands.

use std::sync::Arc;

use speculoos::prelude::*;
use tower::BoxError;
use uuid::Uuid;

use super::{
    activity_feed::ListActivityRequest,
    create_space::CreateSpaceRequest,
    gift_lifecycle::{DeliverGiftRequest, PurchaseGiftRequest, ReserveGiftRequest},
    join_space::JoinSpaceRequest,
    ledger::{GetBalanceRequest, GetSpacePointsRequest},
    receive_gift::ReceiveGiftRequest,
    redeem_reward::RedeemRewardRequest,
    rewards::CreateRewardRequest,
    test_support::{open_members, MemoryLogic},
    wishlist::AddWishlistItemRequest,
    DomainLogic, ErrorCode,
};
use crate::{
    adapters::{
        activity::memory::MemoryActivityLog, database::memory::MemoryDatabase,
        rate_limit::memory::MemoryAttemptLimiter,
    },
    config::ServiceConfig,
    domain::{ActivityType, GiftStatus, Space, ValuationMode},
};

fn world() -> MemoryLogic {
    let config = ServiceConfig::default();
    DomainLogic::new(
        Arc::new(MemoryDatabase::default()),
        Arc::new(open_members()),
        Arc::new(MemoryActivityLog::default()),
        Arc::new(MemoryAttemptLimiter::new(
            config.join_attempt_limit,
            config.join_attempt_window,
        )),
        config,
    )
}

async fn space_with_member(
    domain: &mut MemoryLogic,
    mode: ValuationMode,
) -> Result<(Space, Uuid, Uuid), BoxError> {
    let owner_id = Uuid::new_v4();
    let created = domain
        .handle(CreateSpaceRequest {
            owner_id,
            name: "Home".to_string(),
            valuation_mode: mode,
        })
        .await?;
    let member_id = Uuid::new_v4();
    domain
        .handle(JoinSpaceRequest {
            user_id: member_id,
            join_code: created.space.join_code.to_lowercase(),
        })
        .await?;
    Ok((created.space, owner_id, member_id))
}

#[tokio::test]
async fn test_price_gift_full_lifecycle() -> Result<(), BoxError> {
    // GIVEN a price space with a second member and a wished item
    let mut domain = world();
    let (space, owner_id, member_id) = space_with_member(&mut domain, ValuationMode::Price).await?;

    let created = domain
        .handle(AddWishlistItemRequest {
            space_id: space.id,
            actor_id: owner_id,
            title: "Espresso machine".to_string(),
            price_cents: Some(2599),
            points: None,
        })
        .await?;
    let gift_id = created.gift.id;

    // WHEN the member gives it and the owner receives it
    let reserved = domain
        .handle(ReserveGiftRequest {
            gift_id,
            giver_id: member_id,
        })
        .await?;
    assert_that!(reserved.status).is_equal_to(GiftStatus::Reserved);
    domain
        .handle(PurchaseGiftRequest {
            gift_id,
            price_cents: None,
        })
        .await?;
    domain.handle(DeliverGiftRequest { gift_id }).await?;

    let received = domain
        .handle(ReceiveGiftRequest {
            gift_id,
            actor_id: owner_id,
            sentiment_points: None,
        })
        .await?;

    // THEN the giver earns the rounded price and the feed tells the story
    assert_that!(received.points_awarded).is_equal_to(26);
    assert_that!(received.mode).is_equal_to(ValuationMode::Price);
    assert_that!(received.status).is_equal_to(GiftStatus::Received);
    let balance = domain
        .handle(GetBalanceRequest {
            space_id: space.id,
            user_id: member_id,
        })
        .await?;
    assert_that!(balance.points).is_equal_to(26);

    let kinds: Vec<_> = domain
        .handle(ListActivityRequest {
            space_id: space.id,
            limit: None,
        })
        .await?
        .activity
        .into_iter()
        .map(|activity| activity.activity_type)
        .collect();
    assert_that!(kinds).is_equal_to(vec![
        ActivityType::GiftReceive,
        ActivityType::WishlistAdd,
        ActivityType::MemberJoin,
    ]);

    Ok(())
}

#[tokio::test]
async fn test_sentiment_gift_needs_points() -> Result<(), BoxError> {
    // GIVEN a delivered gift in a sentiment space
    let mut domain = world();
    let (space, owner_id, member_id) =
        space_with_member(&mut domain, ValuationMode::Sentiment).await?;
    let gift_id = domain
        .handle(AddWishlistItemRequest {
            space_id: space.id,
            actor_id: owner_id,
            title: "Handwritten letter".to_string(),
            price_cents: None,
            points: None,
        })
        .await?
        .gift
        .id;
    domain
        .handle(ReserveGiftRequest {
            gift_id,
            giver_id: member_id,
        })
        .await?;
    domain
        .handle(PurchaseGiftRequest {
            gift_id,
            price_cents: None,
        })
        .await?;
    domain.handle(DeliverGiftRequest { gift_id }).await?;

    // WHEN it is received without points
    // THEN it is rejected
    let res = domain
        .handle(ReceiveGiftRequest {
            gift_id,
            actor_id: owner_id,
            sentiment_points: None,
        })
        .await;
    assert_that!(res).is_err().matches(|err| {
        err.code() == ErrorCode::BadRequest && err.status_code() == 400
    });

    // WHEN it is received with points
    // THEN exactly those are credited
    let received = domain
        .handle(ReceiveGiftRequest {
            gift_id,
            actor_id: owner_id,
            sentiment_points: Some(17),
        })
        .await?;
    assert_that!(received.points_awarded).is_equal_to(17);
    assert_that!(received.mode).is_equal_to(ValuationMode::Sentiment);

    Ok(())
}

#[tokio::test]
async fn test_earn_then_redeem() -> Result<(), BoxError> {
    // GIVEN a member who earned 60 points and a reward costing 40
    let mut domain = world();
    let (space, owner_id, member_id) =
        space_with_member(&mut domain, ValuationMode::Sentiment).await?;

    let gift_id = domain
        .handle(AddWishlistItemRequest {
            space_id: space.id,
            actor_id: owner_id,
            title: "Breakfast in bed".to_string(),
            price_cents: None,
            points: None,
        })
        .await?
        .gift
        .id;
    domain
        .handle(ReserveGiftRequest {
            gift_id,
            giver_id: member_id,
        })
        .await?;
    domain
        .handle(PurchaseGiftRequest {
            gift_id,
            price_cents: None,
        })
        .await?;
    domain.handle(DeliverGiftRequest { gift_id }).await?;
    domain
        .handle(ReceiveGiftRequest {
            gift_id,
            actor_id: owner_id,
            sentiment_points: Some(60),
        })
        .await?;

    let reward = domain
        .handle(CreateRewardRequest {
            space_id: space.id,
            owner_id,
            title: "Movie night pick".to_string(),
            points: 40,
            description: None,
            icon: None,
        })
        .await?;

    // WHEN the member redeems it twice
    let redeemed = domain
        .handle(RedeemRewardRequest {
            space_id: space.id,
            reward_id: reward.id,
            redeemer_id: member_id,
        })
        .await?;
    let again = domain
        .handle(RedeemRewardRequest {
            space_id: space.id,
            reward_id: reward.id,
            redeemer_id: member_id,
        })
        .await;

    // THEN only the first one goes through
    assert_that!(redeemed.balance.points).is_equal_to(20);
    assert_that!(again)
        .is_err()
        .matches(|err| err.status_code() == 403);

    let total = domain
        .handle(GetSpacePointsRequest { space_id: space.id })
        .await?;
    assert_that!(total.points).is_equal_to(20);

    Ok(())
}
