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
        ledger::REASON_REWARD_REDEEM, ActivityType, NewActivity, NewLedgerEntry, RewardRedemption,
    },
    ports::{
        activity::ActivityPort,
        database::{self, DatabasePort},
        member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{activity::record_activity, ledger::BalanceResponse, DomainLogic, Error};

const NOT_ENOUGH_POINTS: &str = "Not enough points to redeem this reward.";

pub struct RedeemRewardRequest {
    pub space_id: Uuid,
    pub reward_id: Uuid,
    pub redeemer_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRewardResponse {
    /// Balance of the redeemer after the debit
    pub balance: BalanceResponse,
    pub redemption: RewardRedemption,
}

impl<D, M, A, L> Service<RedeemRewardRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = RedeemRewardResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RedeemRewardRequest) -> Self::Future {
        let database = self.database.clone();
        let activity = self.activity.clone();
        Box::pin(async move {
            let reward = database
                .get_reward(req.reward_id)
                .await?
                .filter(|reward| reward.space_id == req.space_id)
                .ok_or_else(|| Error::NotFound("Reward not found.".into()))?;

            if reward.owner_id == req.redeemer_id {
                return Err(Error::Forbidden("You cannot redeem your own reward.".into()));
            }
            if reward.points == 0 {
                return Err(Error::Forbidden("This reward has no valid cost.".into()));
            }

            // Early exit for the common case. The store checks again before debiting.
            let balance = database.balance(req.space_id, req.redeemer_id).await?;
            if balance < reward.points {
                return Err(Error::Forbidden(NOT_ENOUGH_POINTS.into()));
            }

            let redemption = RewardRedemption::pending(&reward, req.redeemer_id, Utc::now());
            let debit = NewLedgerEntry::debit(
                req.space_id,
                req.redeemer_id,
                reward.points,
                REASON_REWARD_REDEEM,
            )?
            .with_meta(serde_json::json!({
                "rewardId": reward.id,
                "redemptionId": redemption.id,
            }));

            database
                .commit_redemption(redemption.clone(), debit)
                .await
                .map_err(|err| match err {
                    database::Error::InsufficientBalance { balance, required } => {
                        tracing::warn!(
                            space_id = %req.space_id,
                            redeemer_id = %req.redeemer_id,
                            balance,
                            required,
                            "balance changed before redemption was stored"
                        );
                        Error::Forbidden(NOT_ENOUGH_POINTS.into())
                    }
                    other => Error::Database(other),
                })?;

            let points = database.balance(req.space_id, req.redeemer_id).await?;
            tracing::info!(
                space_id = %req.space_id,
                reward_id = %reward.id,
                redemption_id = %redemption.id,
                cost = reward.points,
                balance = points,
                "reward redeemed"
            );

            record_activity(
                activity.as_ref(),
                NewActivity::new(req.space_id, req.redeemer_id, ActivityType::RewardRedeem)
                    .with_payload(serde_json::json!({
                        "rewardId": reward.id,
                        "title": reward.title,
                        "points": reward.points,
                    })),
            )
            .await;

            Ok(RedeemRewardResponse {
                balance: BalanceResponse {
                    user_id: req.redeemer_id,
                    points,
                },
                redemption,
            })
        })
    }
}
