use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{ActivityType, NewActivity, Reward},
    ports::{
        activity::ActivityPort, database::DatabasePort, member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{activity::record_activity, DomainLogic, Error};

/// Offer a new reward in a space's catalog
pub struct CreateRewardRequest {
    pub space_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    /// Cost in points
    pub points: u32,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl<D, M, A, L> Service<CreateRewardRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = Reward;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateRewardRequest) -> Self::Future {
        let database = self.database.clone();
        let activity = self.activity.clone();
        Box::pin(async move {
            let title = req.title.trim();
            if title.is_empty() {
                return Err(Error::BadRequest("title is required".into()));
            }
            if req.points == 0 {
                return Err(Error::BadRequest("points must be a positive integer".into()));
            }
            if database.get_space(req.space_id).await?.is_none() {
                return Err(Error::NotFound("Space not found.".into()));
            }

            let reward = database
                .insert_reward(Reward {
                    id: Uuid::new_v4(),
                    space_id: req.space_id,
                    owner_id: req.owner_id,
                    title: title.to_string(),
                    points: req.points,
                    description: non_blank(req.description),
                    icon: non_blank(req.icon),
                    created_at: Utc::now(),
                })
                .await?;

            tracing::info!(
                space_id = %reward.space_id,
                reward_id = %reward.id,
                points = reward.points,
                "reward added"
            );
            record_activity(
                activity.as_ref(),
                NewActivity::new(reward.space_id, reward.owner_id, ActivityType::RewardAdd)
                    .with_payload(serde_json::json!({
                        "rewardId": reward.id,
                        "title": reward.title,
                        "points": reward.points,
                    })),
            )
            .await;

            Ok(reward)
        })
    }
}

/// Change a reward. Only its owner may do so.
///
/// Fields left to `None` keep their stored value.
pub struct UpdateRewardRequest {
    pub reward_id: Uuid,
    pub actor_id: Uuid,
    pub title: Option<String>,
    pub points: Option<u32>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Remove a reward from the catalog. Only its owner may do so.
pub struct DeleteRewardRequest {
    pub reward_id: Uuid,
    pub actor_id: Uuid,
}

pub struct ListRewardsRequest {
    pub space_id: Uuid,
}

impl<D, M, A, L> Service<UpdateRewardRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = Reward;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: UpdateRewardRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let mut reward = owned_reward(database.as_ref(), req.reward_id, req.actor_id).await?;

            if let Some(title) = req.title {
                let title = title.trim();
                if title.is_empty() {
                    return Err(Error::BadRequest("title is required".into()));
                }
                reward.title = title.to_string();
            }
            if let Some(points) = req.points {
                if points == 0 {
                    return Err(Error::BadRequest("points must be a positive integer".into()));
                }
                reward.points = points;
            }
            if req.description.is_some() {
                reward.description = non_blank(req.description);
            }
            if req.icon.is_some() {
                reward.icon = non_blank(req.icon);
            }

            let reward = database.update_reward(reward).await?;
            tracing::info!(reward_id = %reward.id, points = reward.points, "reward updated");
            Ok(reward)
        })
    }
}

impl<D, M, A, L> Service<DeleteRewardRequest> for DomainLogic<D, M, A, L>
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

    fn call(&mut self, req: DeleteRewardRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            owned_reward(database.as_ref(), req.reward_id, req.actor_id).await?;
            if !database.delete_reward(req.reward_id).await? {
                return Err(Error::NotFound("Reward not found.".into()));
            }
            tracing::info!(reward_id = %req.reward_id, "reward deleted");
            Ok(())
        })
    }
}

impl<D, M, A, L> Service<ListRewardsRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = Vec<Reward>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListRewardsRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            if database.get_space(req.space_id).await?.is_none() {
                return Err(Error::NotFound("Space not found.".into()));
            }
            Ok(database.list_rewards(req.space_id).await?)
        })
    }
}

/// Load a reward the actor is allowed to change
async fn owned_reward<D>(database: &D, reward_id: Uuid, actor_id: Uuid) -> Result<Reward, Error>
where
    D: DatabasePort + ?Sized,
{
    let reward = database
        .get_reward(reward_id)
        .await?
        .ok_or_else(|| Error::NotFound("Reward not found.".into()))?;
    if reward.owner_id != actor_id {
        tracing::warn!(%reward_id, %actor_id, "reward change by non-owner refused");
        return Err(Error::Forbidden("Only the reward owner can change it.".into()));
    }
    Ok(reward)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
