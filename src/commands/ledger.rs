//! Read side of the points ledger.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde::Serialize;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{ledger, LedgerEntry},
    ports::{
        activity::ActivityPort, database::DatabasePort, member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{DomainLogic, Error};

pub struct GetBalanceRequest {
    pub space_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub points: u32,
}

pub struct GetLedgerRequest {
    pub space_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub balance: BalanceResponse,
    /// Newest first
    pub entries: Vec<LedgerEntry>,
}

/// Points held by all members of a space
pub struct GetSpacePointsRequest {
    pub space_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacePointsResponse {
    pub space_id: Uuid,
    pub points: u64,
}

impl<D, M, A, L> Service<GetBalanceRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = BalanceResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetBalanceRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let points = database.balance(req.space_id, req.user_id).await?;
            Ok(BalanceResponse {
                user_id: req.user_id,
                points,
            })
        })
    }
}

impl<D, M, A, L> Service<GetLedgerRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = LedgerResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetLedgerRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let entries = database.ledger_entries(req.space_id, req.user_id).await?;
            // Same fold as the store, over the same rows
            let points = ledger::balance(&entries);
            Ok(LedgerResponse {
                balance: BalanceResponse {
                    user_id: req.user_id,
                    points,
                },
                entries,
            })
        })
    }
}

impl<D, M, A, L> Service<GetSpacePointsRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = SpacePointsResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetSpacePointsRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            if database.get_space(req.space_id).await?.is_none() {
                return Err(Error::NotFound("Space not found.".into()));
            }

            let entries = database.space_ledger(req.space_id).await?;
            Ok(SpacePointsResponse {
                space_id: req.space_id,
                points: ledger::space_total(&entries),
            })
        })
    }
}
