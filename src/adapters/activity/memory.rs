use crate::{
    adapters::database::memory::ErasedPoisonError,
    domain::{Activity, NewActivity},
    ports::activity::{ActivityPort, Error},
};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct MemoryActivityLog {
    activities: Arc<Mutex<Vec<Activity>>>,
}

#[async_trait::async_trait]
impl ActivityPort for MemoryActivityLog {
    async fn record(&self, activity: NewActivity) -> Result<Activity, Error> {
        let activity = activity.into_activity(Utc::now());
        self.activities.lock()?.push(activity.clone());
        Ok(activity)
    }

    async fn list(&self, space_id: Uuid) -> Result<Vec<Activity>, Error> {
        let activities = self.activities.lock()?;
        Ok(activities
            .iter()
            .rev()
            .filter(|activity| activity.space_id == space_id)
            .cloned()
            .collect())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
