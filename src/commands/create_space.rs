use std::{
    future::Future,
    pin::Pin,
    sync::Mutex,
    task::{Context, Poll},
};

use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        codes::{self, Exhausted},
        MemberRole, Space, SpaceMember, ValuationMode,
    },
    ports::{
        activity::ActivityPort,
        database::{self, DatabasePort},
        member::MemberPort,
        rate_limit::AttemptLimiterPort,
    },
};

use super::{DomainLogic, Error};

type SharedRng = Mutex<Box<dyn RngCore + Send>>;

pub struct CreateSpaceRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub valuation_mode: ValuationMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpaceResponse {
    pub space: Space,
    pub owner: SpaceMember,
}

impl<D, M, A, L> Service<CreateSpaceRequest> for DomainLogic<D, M, A, L>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    A: ActivityPort + 'static,
    L: AttemptLimiterPort + 'static,
{
    type Response = CreateSpaceResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateSpaceRequest) -> Self::Future {
        let database = self.database.clone();
        let rng = self.rng.clone();
        let attempts = self.config.code_attempts.max(1);
        Box::pin(async move {
            let name = req.name.trim();
            if name.is_empty() {
                return Err(Error::BadRequest("name is required".into()));
            }

            for attempt in 1..=attempts {
                let join_code = allocate_join_code(database.as_ref(), &rng, attempts).await?;
                let invite_code = draw(&rng, |rng| codes::invite_code(rng))?;

                let now = Utc::now();
                let space = Space {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    valuation_mode: req.valuation_mode,
                    join_code,
                    invite_code,
                    created_at: now,
                };
                let owner = SpaceMember::new(space.id, req.owner_id, MemberRole::Owner, now);

                match database.insert_space(space, owner.clone()).await {
                    Ok(space) => {
                        tracing::info!(
                            space_id = %space.id,
                            owner_id = %owner.user_id,
                            mode = %space.valuation_mode,
                            attempt,
                            "space created"
                        );
                        return Ok(CreateSpaceResponse { space, owner });
                    }
                    Err(database::Error::UniqueViolation(field)) => {
                        tracing::warn!(attempt, %field, "space code collision, retrying");
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            tracing::error!(attempts, "no free space codes left after retries");
            Err(Error::SpaceCodeConflict(Exhausted { attempts }))
        })
    }
}

/// Draw join codes until one is not used by any stored space
///
/// The store's unique constraint still has the final say on insert.
async fn allocate_join_code<D>(
    database: &D,
    rng: &SharedRng,
    attempts: u32,
) -> Result<String, Error>
where
    D: DatabasePort + ?Sized,
{
    for attempt in 1..=attempts {
        let candidate = draw(rng, |rng| codes::join_code(rng))?;
        if !database.join_code_exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        tracing::warn!(attempt, "join code already taken");
    }

    tracing::error!(attempts, "join code generation failed");
    Err(Error::JoinCodeGenerationFailed(Exhausted { attempts }))
}

fn draw<T>(
    rng: &SharedRng,
    generate: impl FnOnce(&mut (dyn RngCore + Send + 'static)) -> T,
) -> Result<T, Error> {
    let mut rng = rng
        .lock()
        .map_err(|_| Error::InvalidState("random source lock poisoned".into()))?;
    Ok(generate(&mut **rng))
}
