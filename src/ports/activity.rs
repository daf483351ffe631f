use uuid::Uuid;

use crate::domain::{Activity, NewActivity};

/// Storage for the space activity feed
#[mockall::automock]
#[async_trait::async_trait]
pub trait ActivityPort {
    async fn record(&self, activity: NewActivity) -> Result<Activity, Error>;
    /// Activities of a space, newest first
    async fn list(&self, space_id: Uuid) -> Result<Vec<Activity>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
