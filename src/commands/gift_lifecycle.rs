use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Gift, GiftStatus},
    ports::{
        activity::ActivityPort,
        database::{DatabasePort, GiftContext},
        member::{self, MemberPort},
        rate_limit::AttemptLimiterPort,
    },
};

use super::{DomainLogic, Error};

/// Reserve a pending gift on behalf of a giver
pub struct ReserveGiftRequest {
    pub gift_id: Uuid,
    pub giver_id: Uuid,
}

/// Mark a reserved gift as purchased
pub struct PurchaseGiftRequest {
    pub gift_id: Uuid,
    /// Price actually paid, which then decides the gift's points
    pub price_cents: Option<i64>,
}

pub struct DeliverGiftRequest {
    pub gift_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftLifecycleResponse {
    pub gift_id: Uuid,
    pub status: GiftStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Gift> for GiftLifecycleResponse {
    fn from(gift: &Gift) -> Self {
        Self {
            gift_id: gift.id,
            status: gift.status,
            updated_at: gift.updated_at,
        }
    }
}

pub(crate) async fn load_gift<D>(database: &D, gift_id: Uuid) -> Result<GiftContext, Error>
where
    D: DatabasePort + ?Sized,
{
    database
        .get_gift_context(gift_id)
        .await?
        .ok_or_else(|| Error::NotFound("Gift not found.".into()))
}

/// Persist a gift that moved one step, guarding against concurrent moves
async fn store_transition<D>(
    database: &D,
    gift: Gift,
    previous: GiftStatus,
) -> Result<GiftLifecycleResponse, Error>
where
    D: DatabasePort + ?Sized,
{
    let gift = database.update_gift(gift, previous).await?;
    tracing::info!(
        gift_id = %gift.id,
        from = %previous,
        to = %gift.status,
        "gift moved"
    );
    Ok(GiftLifecycleResponse::from(&gift))
}

impl<D, M, A, L> Service<ReserveGiftRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = GiftLifecycleResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ReserveGiftRequest) -> Self::Future {
        let database = self.database.clone();
        let member = self.member.clone();
        Box::pin(async move {
            let GiftContext { mut gift, item, .. } =
                load_gift(database.as_ref(), req.gift_id).await?;
            let previous = gift.status;
            previous.ensure_next(GiftStatus::Reserved)?;

            // The giver must be a known user
            let giver = member
                .get_member(req.giver_id)
                .await
                .map_err(|err| match err {
                    member::Error::MemberDoesNotExist(_) => {
                        Error::NotFound("Giver not found.".into())
                    }
                    other => Error::Member(other),
                })?;

            gift.reserve(&item, giver.user_id, Utc::now())?;
            store_transition(database.as_ref(), gift, previous).await
        })
    }
}

impl<D, M, A, L> Service<PurchaseGiftRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = GiftLifecycleResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PurchaseGiftRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let GiftContext { mut gift, item, .. } =
                load_gift(database.as_ref(), req.gift_id).await?;
            let previous = gift.status;

            gift.purchase(&item, req.price_cents, Utc::now())?;
            store_transition(database.as_ref(), gift, previous).await
        })
    }
}

impl<D, M, A, L> Service<DeliverGiftRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = GiftLifecycleResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DeliverGiftRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let GiftContext { mut gift, .. } = load_gift(database.as_ref(), req.gift_id).await?;
            let previous = gift.status;

            gift.deliver(Utc::now())?;
            store_transition(database.as_ref(), gift, previous).await
        })
    }
}
