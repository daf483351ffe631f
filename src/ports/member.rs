use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Directory of registered users, owned by the authentication service
#[mockall::automock]
#[async_trait::async_trait]
pub trait MemberPort {
    async fn get_member(&self, user_id: Uuid) -> Result<Member, Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub user_id: Uuid,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered user has this id
    #[error("user {0} does not exist")]
    MemberDoesNotExist(Uuid),

    /// The user directory could not be reached or answered garbage
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
