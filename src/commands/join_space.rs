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
    domain::{codes, ActivityType, MemberRole, NewActivity, Space, SpaceMember},
    ports::{
        activity::ActivityPort, database::DatabasePort, member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{activity::record_activity, DomainLogic, Error};

/// Join a space with the code shared by one of its members
pub struct JoinSpaceRequest {
    pub user_id: Uuid,
    /// As typed by the user. Surrounding whitespace and case are ignored.
    pub join_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpaceResponse {
    pub space: Space,
    pub member: SpaceMember,
}

fn limiter_key(user_id: Uuid) -> String {
    format!("join:{user_id}")
}

impl<D, M, A, L> Service<JoinSpaceRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = JoinSpaceResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: JoinSpaceRequest) -> Self::Future {
        let database = self.database.clone();
        let activity = self.activity.clone();
        let limiter = self.limiter.clone();
        Box::pin(async move {
            let join_code = codes::normalize_join_code(&req.join_code);
            if join_code.is_empty() {
                return Err(Error::BadRequest("joinCode is required".into()));
            }

            let key = limiter_key(req.user_id);
            if let Err(err) = limiter.register_attempt(key.clone()).await {
                tracing::warn!(user_id = %req.user_id, error = %err, "join attempt refused");
                return Err(err.into());
            }

            let space = database
                .find_space_by_join_code(join_code)
                .await?
                .ok_or_else(|| Error::NotFound("Space not found.".into()))?;

            let requested =
                SpaceMember::new(space.id, req.user_id, MemberRole::Member, Utc::now());
            let member = database.add_member(requested.clone()).await?;
            // The membership is stored at this point
            if let Err(err) = limiter.reset(key).await {
                tracing::warn!(
                    user_id = %req.user_id,
                    error = %err,
                    "failed to reset join attempts"
                );
            }

            if member == requested {
                tracing::info!(space_id = %space.id, user_id = %req.user_id, "member joined");
                record_activity(
                    activity.as_ref(),
                    NewActivity::new(space.id, req.user_id, ActivityType::MemberJoin)
                        .with_payload(serde_json::json!({ "spaceName": space.name })),
                )
                .await;
            } else {
                tracing::debug!(space_id = %space.id, user_id = %req.user_id, "already a member");
            }

            Ok(JoinSpaceResponse { space, member })
        })
    }
}
