use std::{
    borrow::Cow,
    sync::{Arc, Mutex},
};

use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tower::{Service, ServiceExt};

use crate::{
    config::ServiceConfig,
    domain::{codes::Exhausted, LedgerError, TransitionError},
    ports::{activity as activity_port, database, member, rate_limit},
};

pub mod activity;
pub mod activity_feed;
pub mod create_space;
pub mod gift_lifecycle;
pub mod join_space;
pub mod ledger;
pub mod receive_gift;
pub mod redeem_reward;
pub mod rewards;
pub mod wishlist;

#[cfg(test)]
mod scenarios;

/// Shared state behind every command
///
/// Each operation is a `tower::Service` implementation on this type.
pub struct DomainLogic<D, M, A, L> {
    database: Arc<D>,
    member: Arc<M>,
    activity: Arc<A>,
    limiter: Arc<L>,
    rng: Arc<Mutex<Box<dyn RngCore + Send>>>,
    config: ServiceConfig,
}

impl<D, M, A, L> DomainLogic<D, M, A, L> {
    pub fn new(
        database: Arc<D>,
        member: Arc<M>,
        activity: Arc<A>,
        limiter: Arc<L>,
        config: ServiceConfig,
    ) -> Self {
        Self::with_rng(
            database,
            member,
            activity,
            limiter,
            config,
            Box::new(StdRng::from_os_rng()),
        )
    }

    /// Same as [`DomainLogic::new`] with an explicit random source for codes
    pub fn with_rng(
        database: Arc<D>,
        member: Arc<M>,
        activity: Arc<A>,
        limiter: Arc<L>,
        config: ServiceConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            database,
            member,
            activity,
            limiter,
            rng: Arc::new(Mutex::new(rng)),
            config,
        }
    }

    /// Wait until the service is ready, then run one request
    ///
    /// `DomainLogic` serves several request types, so `ServiceExt::ready`
    /// alone cannot infer which one is meant.
    pub async fn handle<R>(&mut self, req: R) -> Result<<Self as Service<R>>::Response, Error>
    where
        Self: Service<R, Error = Error>,
    {
        let service = ServiceExt::<R>::ready(self).await?;
        Service::<R>::call(service, req).await
    }
}

impl<D, M, A, L> Clone for DomainLogic<D, M, A, L> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            member: self.member.clone(),
            activity: self.activity.clone(),
            limiter: self.limiter.clone(),
            rng: self.rng.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("database port error: {0:?}")]
    Database(#[from] database::Error),
    #[error("member port error: {0:?}")]
    Member(#[from] member::Error),
    #[error("rate limit port error: {0:?}")]
    Limiter(#[from] rate_limit::Error),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("activity port error: {0:?}")]
    Activity(#[from] activity_port::Error),

    #[error("{0}")]
    NotFound(Cow<'static, str>),
    #[error("{0}")]
    InvalidTransition(TransitionError),
    #[error("{0}")]
    BadRequest(Cow<'static, str>),
    #[error("{0}")]
    Forbidden(Cow<'static, str>),
    #[error("{0}")]
    Conflict(Cow<'static, str>),

    /// Every join code drawn was already in use
    #[error("join code generation failed: {0}")]
    JoinCodeGenerationFailed(Exhausted),
    /// Every space insert hit a unique constraint
    #[error("space code conflict: {0}")]
    SpaceCodeConflict(Exhausted),

    #[error("invalid state")]
    InvalidState(Cow<'static, str>),
}

impl From<TransitionError> for Error {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { .. } => Error::InvalidTransition(err),
            TransitionError::Archived => Error::Conflict(err.to_string().into()),
            TransitionError::SentimentRequired => Error::BadRequest(err.to_string().into()),
        }
    }
}

/// Error category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidTransition,
    BadRequest,
    Forbidden,
    Conflict,
    TooManyRequests,
    JoinCodeGenerationFailed,
    SpaceCodeConflict,
    Internal,
}

impl ErrorCode {
    /// HTTP status used by the REST layer for this code
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::BadRequest => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidTransition | ErrorCode::Conflict | ErrorCode::SpaceCodeConflict => {
                409
            }
            ErrorCode::TooManyRequests => 429,
            ErrorCode::JoinCodeGenerationFailed | ErrorCode::Internal => 500,
        }
    }
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::InvalidTransition(_) => ErrorCode::InvalidTransition,
            Error::BadRequest(_) => ErrorCode::BadRequest,
            Error::Forbidden(_) => ErrorCode::Forbidden,
            Error::Conflict(_) => ErrorCode::Conflict,
            Error::JoinCodeGenerationFailed(_) => ErrorCode::JoinCodeGenerationFailed,
            Error::SpaceCodeConflict(_) => ErrorCode::SpaceCodeConflict,
            Error::Database(err) => match err {
                database::Error::StaleGift { .. } => ErrorCode::InvalidTransition,
                database::Error::InsufficientBalance { .. } => ErrorCode::Forbidden,
                database::Error::UniqueViolation(_) => ErrorCode::Conflict,
                database::Error::MissingRecord(_) => ErrorCode::NotFound,
                database::Error::Adapter(_) => ErrorCode::Internal,
            },
            Error::Member(member::Error::MemberDoesNotExist(_)) => ErrorCode::NotFound,
            Error::Limiter(rate_limit::Error::LimitExceeded { .. }) => ErrorCode::TooManyRequests,
            Error::Member(_)
            | Error::Limiter(_)
            | Error::Ledger(_)
            | Error::Activity(_)
            | Error::InvalidState(_) => ErrorCode::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }
}
