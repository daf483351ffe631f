use crate::ports::rate_limit::{AttemptLimiterPort, Error};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock, Reference},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectRateLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Per-key attempt limiter kept in process memory
///
/// Each key gets a GCRA limiter allowing a burst of `limit` attempts, with one
/// attempt replenished every `window / limit`. Keys idle for a whole window
/// are fully replenished and get evicted.
#[derive(Clone)]
pub struct MemoryAttemptLimiter<C: Clock = DefaultClock> {
    quota: Quota,
    window: Duration,
    clock: C,
    limiters: Arc<DashMap<String, Tracked<C>>>,
}

struct Tracked<C: Clock> {
    limiter: Arc<DirectRateLimiter<C>>,
    last_attempt: C::Instant,
}

impl MemoryAttemptLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, DefaultClock::default())
    }
}

impl<C: Clock + Clone> MemoryAttemptLimiter<C> {
    pub fn with_clock(limit: u32, window: Duration, clock: C) -> Self {
        let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        let period = window
            .checked_div(burst.get())
            .filter(|period| !period.is_zero())
            .unwrap_or(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            quota,
            window,
            clock,
            limiters: Arc::new(DashMap::new()),
        }
    }

    fn evict_idle(&self, now: C::Instant) {
        self.limiters.retain(|_, tracked| {
            Duration::from(now.duration_since(tracked.last_attempt)) < self.window
        });
    }

    fn register(&self, key: String) -> Result<(), Error> {
        let now = self.clock.now();
        self.evict_idle(now);

        let limiter = {
            let mut tracked = self.limiters.entry(key).or_insert_with(|| Tracked {
                limiter: Arc::new(RateLimiter::direct_with_clock(
                    self.quota,
                    self.clock.clone(),
                )),
                last_attempt: now,
            });
            tracked.last_attempt = now;
            tracked.limiter.clone()
        };

        limiter.check().map_err(|not_until| Error::LimitExceeded {
            retry_after_secs: not_until.wait_time_from(now).as_secs().max(1),
        })
    }
}

#[async_trait::async_trait]
impl<C> AttemptLimiterPort for MemoryAttemptLimiter<C>
where
    C: Clock + Clone + Send + Sync,
    C::Instant: Send + Sync,
{
    async fn register_attempt(&self, key: String) -> Result<(), Error> {
        self.register(key)
    }

    async fn reset(&self, key: String) -> Result<(), Error> {
        self.limiters.remove(&key);
        Ok(())
    }
}
