//! Run state shared by the drivers: processing and batch flags, the
//! navigation cursor, and the stop signal.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use action_locator::{LocateContext, PinnedCard};
use parking_lot::{Mutex, MutexGuard};
use stockmeta_core_types::{ImageId, RunId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Where the batch is and what it has tried.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavigationCursor {
    pub last_processed: Option<ImageId>,
    pub stuck_attempts: u32,
    /// Item the recovery should move to
    pub target_next: Option<ImageId>,
    /// Card the batch clicked; the main image is taken from its thumbnail
    pub pinned_card: Option<PinnedCard>,
}

impl NavigationCursor {
    /// Record a newly seen item and reset recovery state.
    pub fn advance(&mut self, id: ImageId) {
        self.last_processed = Some(id);
        self.stuck_attempts = 0;
        self.target_next = None;
    }

    pub fn locate_context(&self) -> LocateContext {
        LocateContext {
            pinned: self.pinned_card.clone(),
        }
    }
}

pub struct RunSession {
    run_id: RunId,
    processing: AtomicBool,
    batch: AtomicBool,
    cursor: Mutex<NavigationCursor>,
    stop: Mutex<CancellationToken>,
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSession {
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            processing: AtomicBool::new(false),
            batch: AtomicBool::new(false),
            cursor: Mutex::new(NavigationCursor::default()),
            stop: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn is_batch(&self) -> bool {
        self.batch.load(Ordering::SeqCst)
    }

    fn arm(&self) {
        let mut stop = self.stop.lock();
        if stop.is_cancelled() {
            *stop = CancellationToken::new();
        }
    }

    /// Claim the session for one item. False when something is running.
    pub fn try_begin_single(&self) -> bool {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.arm();
        true
    }

    /// Claim the session for a batch and start a fresh cursor.
    pub fn try_begin_batch(&self) -> bool {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.batch.store(true, Ordering::SeqCst);
        *self.cursor.lock() = NavigationCursor::default();
        self.arm();
        true
    }

    /// Clears the processing flag unless a batch owns it.
    pub fn finish_single(&self) {
        if !self.is_batch() {
            self.processing.store(false, Ordering::SeqCst);
        }
    }

    pub fn finish_batch(&self) {
        self.processing.store(false, Ordering::SeqCst);
        self.batch.store(false, Ordering::SeqCst);
        *self.cursor.lock() = NavigationCursor::default();
    }

    /// Stop button: clear both flags and wake anything pausing.
    pub fn request_stop(&self) {
        if self.is_processing() {
            warn!(run = %self.run_id, "Stopping...");
        }
        self.processing.store(false, Ordering::SeqCst);
        self.batch.store(false, Ordering::SeqCst);
        self.stop.lock().cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.lock().clone()
    }

    pub fn cursor(&self) -> MutexGuard<'_, NavigationCursor> {
        self.cursor.lock()
    }

    /// Sleep for `duration`, waking early on stop. Returns false when stopped.
    pub async fn pause(&self, duration: Duration) -> bool {
        if !self.is_processing() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        let token = self.stop_token();
        tokio::select! {
            _ = token.cancelled() => {
                debug!("pause interrupted by stop");
                false
            }
            _ = tokio::time::sleep(duration) => self.is_processing(),
        }
    }

    /// Drive `fut` unless a stop arrives first.
    pub async fn unless_stopped<F: Future>(&self, fut: F) -> Option<F::Output> {
        let token = self.stop_token();
        tokio::select! {
            _ = token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn single_run_refuses_while_busy() {
        let session = RunSession::new();
        assert!(session.try_begin_single());
        assert!(!session.try_begin_single());
        assert!(!session.try_begin_batch());
        session.finish_single();
        assert!(!session.is_processing());
    }

    #[test]
    fn single_finish_leaves_batch_flags_alone() {
        let session = RunSession::new();
        assert!(session.try_begin_batch());
        session.finish_single();
        assert!(session.is_processing());
        assert!(session.is_batch());
        session.finish_batch();
        assert!(!session.is_processing() && !session.is_batch());
    }

    #[test]
    fn advancing_resets_recovery_state() {
        let mut cursor = NavigationCursor {
            stuck_attempts: 3,
            target_next: Some(ImageId("2000002".into())),
            ..NavigationCursor::default()
        };
        cursor.advance(ImageId("2000003".into()));
        assert_eq!(cursor.last_processed, Some(ImageId("2000003".into())));
        assert_eq!(cursor.stuck_attempts, 0);
        assert_eq!(cursor.target_next, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wakes_a_pause_early() {
        let session = Arc::new(RunSession::new());
        assert!(session.try_begin_batch());
        let stopper = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stopper.request_stop();
        });
        let started = Instant::now();
        assert!(!session.pause(Duration::from_secs(10)).await);
        assert_eq!(started.elapsed(), Duration::from_millis(300));

        // A new run gets a fresh stop signal.
        assert!(session.try_begin_single());
        assert!(session.pause(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn unless_stopped_abandons_the_future() {
        let session = RunSession::new();
        assert!(session.try_begin_single());
        session.request_stop();
        let out = session
            .unless_stopped(std::future::pending::<()>())
            .await;
        assert!(out.is_none());
    }
}
