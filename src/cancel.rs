use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{WalkError, WalkResult};

/// How often a blocked task re-checks its cancellation token.
pub const WAKE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative stop signal shared by every task of a run.
///
/// Tasks check it at each suspension point and leave their loop with
/// [`WalkError::Cancelled`] once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> WalkResult<()> {
        if self.is_cancelled() {
            Err(WalkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration`, waking early with `Cancelled` if the token fires.
    pub fn sleep(&self, duration: Duration) -> WalkResult<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(WAKE_CHECK_INTERVAL));
        }
    }
}
