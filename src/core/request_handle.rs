/*
 * A handle to one outstanding `ProfileClient` request. Cancelling it
 * guarantees the request's completion callback will not run, whether the
 * result is still in flight or already waiting on the main queue. Dropping a
 * handle does not cancel anything.
 */
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RequestHandle {
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl RequestHandle {
    pub(crate) fn new() -> Self {
        RequestHandle {
            token: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    // True once the callback has run or can no longer run.
    pub fn is_finished(&self) -> bool {
        self.is_cancelled() || self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /*
     * A guard that marks this request finished when it is dropped. The
     * request's task owns it and hands it on to the posted job, so the handle
     * finishes after the callback has run, or when the result is dropped on
     * any path (main queue gone, job discarded, task aborted).
     */
    pub(crate) fn finish_on_drop(&self) -> FinishOnDrop {
        FinishOnDrop {
            handle: self.clone(),
        }
    }
}

pub(crate) struct FinishOnDrop {
    handle: RequestHandle,
}

impl FinishOnDrop {
    pub(crate) fn handle(&self) -> &RequestHandle {
        &self.handle
    }
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.handle.finished.store(true, Ordering::SeqCst);
    }
}
