//! Environment abstraction for deterministic testing.
//!
//! Decouples orchestration logic from system time. The bootstrap session has
//! two bounded waits (transport readiness, verification-secret polling) and
//! both must run on virtual or immediate time under test.

use std::time::Duration;

/// Abstract environment providing monotonic time and async sleep.
///
/// # Safety
///
/// Implementations MUST guarantee that `now()` never goes backwards within a
/// single execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; test environments
    /// may use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait. Test environments may
    /// return immediately to make bounded waits instantaneous.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production environment backed by the system clock and tokio's timer.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! Deterministic environments for tests.

    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use super::Environment;

    /// Environment with a virtual clock.
    ///
    /// `sleep` advances the clock by the requested duration and resolves
    /// immediately, so bounded waits run instantaneously while still
    /// observing elapsed virtual time.
    #[derive(Debug, Clone, Default)]
    pub struct MockEnv {
        clock: Arc<Mutex<Duration>>,
    }

    impl MockEnv {
        /// Create a mock environment with the clock at zero.
        pub fn new() -> Self {
            Self::default()
        }

        /// Total virtual time slept so far.
        pub fn elapsed(&self) -> Duration {
            *self.clock.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Environment for MockEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            self.elapsed()
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            {
                let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
                *clock += duration;
            }
            std::future::ready(())
        }
    }
}
