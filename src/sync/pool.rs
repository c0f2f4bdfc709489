use std::sync::Arc;

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::sync::{
    client::FetchClient,
    request::{Outcome, RequestDescriptor},
};

/// Receipt for a submitted descriptor, echoed back in its [`Completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

/// The outcome produced for one submitted descriptor.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

struct Job {
    ticket: Ticket,
    request: RequestDescriptor,
}

/// Fixed set of workers executing descriptors through a shared [`FetchClient`].
///
/// Workers take descriptors from one FIFO pending queue and push one
/// [`Completion`] per descriptor onto a results queue. Completions of different
/// workers interleave in arrival order. The pool size is the only bound on
/// in-flight requests; callers apply backpressure by choosing how much to
/// submit before draining.
///
/// Every descriptor is re-bound to a child of the pool's cancellation token on
/// submit. Cancelling the pool therefore reaches in-flight fetches at their next
/// retry boundary, and descriptors still queued come back as
/// [`Outcome::Cancelled`] without network activity.
pub struct WorkerPool {
    pending: mpsc::UnboundedSender<Job>,
    results: mpsc::UnboundedReceiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    next_ticket: u64,
    outstanding: usize,
}

impl WorkerPool {
    /// Starts `size` workers on the current tokio runtime. A size of zero is raised to one.
    pub fn new(size: usize, client: Arc<FetchClient>, cancel: CancellationToken) -> Self {
        let size = size.max(1);
        let (pending_tx, pending_rx) = mpsc::unbounded_channel::<Job>();
        let (results_tx, results_rx) = mpsc::unbounded_channel::<Completion>();
        let pending_rx = Arc::new(Mutex::new(pending_rx));

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&pending_rx),
                    results_tx.clone(),
                    Arc::clone(&client),
                ))
            })
            .collect();

        debug!(workers = size, "worker pool started");

        Self {
            pending: pending_tx,
            results: results_rx,
            workers,
            cancel,
            next_ticket: 0,
            outstanding: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Number of submitted descriptors whose completion has not been taken yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Enqueues a descriptor without waiting.
    pub fn submit(&mut self, request: RequestDescriptor) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.outstanding += 1;

        let job = Job {
            ticket,
            request: request.with_cancel(self.cancel.child_token()),
        };

        // fails only once every worker has panicked; next_completion then ends
        if self.pending.send(job).is_err() {
            warn!(?ticket, "no worker left to run request");
        }

        ticket
    }

    /// Waits for the next completion.
    ///
    /// Returns `None` once every submitted descriptor has been answered.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.outstanding == 0 {
            return None;
        }

        let completion = self.results.recv().await?;
        self.outstanding -= 1;
        Some(completion)
    }

    /// Signals cancellation to every queued and in-flight descriptor.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Closes the pending queue and waits for the workers to finish their current request.
    pub async fn shutdown(self) {
        let WorkerPool {
            pending, workers, ..
        } = self;
        drop(pending);
        for worker in workers {
            let _ = worker.await;
        }
        debug!("worker pool stopped");
    }
}

async fn run_worker(
    id: usize,
    pending: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    results: mpsc::UnboundedSender<Completion>,
    client: Arc<FetchClient>,
) {
    loop {
        let job = {
            let mut rx = pending.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };

        let outcome = if job.request.cancel_token().is_cancelled() {
            Outcome::Cancelled
        } else {
            client.execute(&job.request).await
        };

        if results
            .send(Completion {
                ticket: job.ticket,
                outcome,
            })
            .is_err()
        {
            break;
        }
    }

    trace!(worker = id, "worker exited");
}
