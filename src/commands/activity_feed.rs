use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde::Serialize;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::Activity,
    ports::{
        activity::ActivityPort, database::DatabasePort, member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{DomainLogic, Error};

pub const DEFAULT_FEED_LIMIT: usize = 50;
pub const MAX_FEED_LIMIT: usize = 200;

/// Latest activities of a space, newest first
pub struct ListActivityRequest {
    pub space_id: Uuid,
    /// Defaults to [`DEFAULT_FEED_LIMIT`], capped at [`MAX_FEED_LIMIT`]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeedResponse {
    pub activity: Vec<Activity>,
}

impl<D, M, A, L> Service<ListActivityRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = ActivityFeedResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListActivityRequest) -> Self::Future {
        let database = self.database.clone();
        let activity = self.activity.clone();
        Box::pin(async move {
            let limit = match req.limit {
                Some(0) => return Err(Error::BadRequest("limit must be positive".into())),
                Some(limit) => limit.min(MAX_FEED_LIMIT),
                None => DEFAULT_FEED_LIMIT,
            };
            if database.get_space(req.space_id).await?.is_none() {
                return Err(Error::NotFound("Space not found.".into()));
            }

            // Unlike writes, a failing read is reported to the caller
            let mut activities = activity.list(req.space_id).await?;
            activities.truncate(limit);

            Ok(ActivityFeedResponse {
                activity: activities,
            })
        })
    }
}
