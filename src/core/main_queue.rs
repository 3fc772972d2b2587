/*
 * The main queue: the single execution context on which every completion
 * callback and every presenter/view interaction runs. Background tasks post
 * boxed jobs through a `MainQueueSender`; the owner of the `MainQueue` (the UI
 * loop) pumps it. Jobs run in the order they were posted, one at a time, on
 * whatever thread pumps the queue.
 */
use tokio::sync::mpsc;

pub type MainJob = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct MainQueueSender {
    sender: mpsc::UnboundedSender<MainJob>,
}

impl MainQueueSender {
    /*
     * Posts `job` to run on the main queue. Returns `false` if the queue has
     * been dropped, in which case the job is dropped without running.
     */
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(Box::new(job)).is_ok()
    }
}

pub struct MainQueue {
    receiver: mpsc::UnboundedReceiver<MainJob>,
    // Held so that `run_next` never sees a closed channel.
    sender: MainQueueSender,
}

impl MainQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        MainQueue {
            receiver,
            sender: MainQueueSender { sender },
        }
    }

    pub fn sender(&self) -> MainQueueSender {
        self.sender.clone()
    }

    // Runs every job that is already queued, without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        if ran > 0 {
            log::trace!("MainQueue: Ran {ran} pending job(s).");
        }
        ran
    }

    // Waits for the next job and runs it.
    pub async fn run_next(&mut self) {
        if let Some(job) = self.receiver.recv().await {
            job();
        }
    }

    // Pumps the queue until `done` returns true. `done` is checked before each wait.
    pub async fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut() -> bool,
    {
        while !done() {
            self.run_next().await;
        }
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}
