//! In-flight stream accounting and graceful shutdown.
//!
//! Every fragment stream holds a [`StreamGuard`] for as long as its producer
//! runs. Shutdown happens in three phases:
//!
//! 1. New streams are refused with [`Error::ServiceShutdown`].
//! 2. In-flight streams get up to the configured timeout to finish.
//! 3. The shared [`CancellationToken`] is cancelled. Producers still running
//!    stop at their next fragment boundary.

use crate::server::telemetry::{decrement_streams_inflight, increment_streams_inflight};
use core::time::Duration;
use osmshard_tonic_core::Error;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct StreamLifecycle {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
    token: CancellationToken,
    shutdown_timeout: Duration,
}

impl StreamLifecycle {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Registers a new in-flight stream.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceShutdown`] once [`shutdown`](Self::shutdown) has begun.
    pub fn begin(self: &Arc<Self>) -> Result<StreamGuard, Error> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Ok(StreamGuard {
            lifecycle: Arc::clone(self),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Token cancelled when the drain phase ends.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Refuses new streams, waits for in-flight ones, then cancels the rest.
    ///
    /// Returns `true` if every stream finished before the timeout.
    pub async fn shutdown(&self) -> bool {
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new streams");
        self.shutting_down.store(true, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight streams ({} active)", self.inflight());
        let drained = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok();

        if drained {
            #[cfg(feature = "tracing")]
            tracing::debug!("All in-flight streams drained");
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.inflight()
            );
        }

        self.token.cancel();
        drained
    }
}

/// Marks one stream as in flight until dropped.
#[derive(Debug)]
pub struct StreamGuard {
    lifecycle: Arc<StreamLifecycle>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.lifecycle.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
    }
}
