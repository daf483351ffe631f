//! Best-effort activity feed writes.

use crate::{
    domain::{Activity, NewActivity},
    ports::activity::ActivityPort,
};

/// Record an activity without ever failing the caller
///
/// Incomplete activities and storage errors are logged and dropped.
pub(crate) async fn record_activity<A>(activity: &A, new_activity: NewActivity) -> Option<Activity>
where
    A: ActivityPort + ?Sized,
{
    if !new_activity.is_complete() {
        tracing::warn!(
            activity_type = ?new_activity.activity_type,
            "dropping activity without space or actor"
        );
        return None;
    }

    let activity_type = new_activity.activity_type;
    let space_id = new_activity.space_id;
    match activity.record(new_activity).await {
        Ok(recorded) => Some(recorded),
        Err(err) => {
            tracing::warn!(
                error = %err,
                space_id = %space_id,
                activity_type = ?activity_type,
                "failed to record activity"
            );
            None
        }
    }
}
