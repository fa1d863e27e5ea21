//! Background peak extraction.
//!
//! ```text
//! ┌────────────┐  WorkerRequest   ┌──────────────────┐
//! │ PeakClient │ ───────────────► │ peak-worker-0..N │
//! │  (router)  │ ◄─────────────── │   (std threads)  │
//! └────────────┘  WorkerOutcome   └──────────────────┘
//! ```
//!
//! Requests own their sample buffers, so nothing is shared between the
//! caller and a worker. Outcomes come back on one channel in completion
//! order; the client's router thread matches them to callers by id.

use crate::peaks::{ensure_finite, PeakArray};
use crate::protocol::{handle_request, CorrelationId, WorkerRequest, WorkerResponse};
use crossbeam_channel::{self as channel, Receiver, Sender};
use musicverse_core::{Result, StudioError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type CancelSet = Arc<Mutex<HashSet<CorrelationId>>>;

/// Executes one request on a worker thread.
pub(crate) type RequestHandler = fn(WorkerRequest) -> Option<WorkerResponse>;

/// What a worker produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// A protocol response, success or error.
    Response(WorkerResponse),
    /// The computation panicked. The worker thread survives.
    Crashed(CorrelationId),
}

impl WorkerOutcome {
    pub fn id(&self) -> &CorrelationId {
        match self {
            Self::Response(response) => response.id(),
            Self::Crashed(id) => id,
        }
    }

    /// Wire form. A crash is reported as an error response.
    pub fn into_response(self) -> WorkerResponse {
        match self {
            Self::Response(response) => response,
            Self::Crashed(id) => WorkerResponse::error(id, "peak worker crashed"),
        }
    }

    /// Caller-facing result. A crash is a `WorkerCommunication` failure.
    pub fn into_result(self) -> Result<PeakArray> {
        match self {
            Self::Response(response) => response.into_result(),
            Self::Crashed(id) => Err(StudioError::WorkerCommunication(format!(
                "peak worker crashed while handling request {}",
                id
            ))),
        }
    }
}

/// A fixed set of threads computing peaks from a shared request queue.
pub struct PeakWorkerPool {
    request_tx: Option<Sender<WorkerRequest>>,
    outcome_rx: Receiver<WorkerOutcome>,
    cancelled: CancelSet,
    threads: Vec<JoinHandle<()>>,
}

impl PeakWorkerPool {
    /// Spawn `threads` workers.
    pub fn spawn(threads: usize) -> Result<Self> {
        Self::with_handler(threads, handle_request)
    }

    pub(crate) fn with_handler(threads: usize, handler: RequestHandler) -> Result<Self> {
        if threads == 0 {
            return Err(StudioError::InvalidArgument(
                "worker pool needs at least one thread".into(),
            ));
        }

        let (request_tx, request_rx) = channel::unbounded::<WorkerRequest>();
        let (outcome_tx, outcome_rx) = channel::unbounded::<WorkerOutcome>();
        let cancelled: CancelSet = Arc::new(Mutex::new(HashSet::new()));

        let mut handles = Vec::with_capacity(threads);
        for n in 0..threads {
            let requests = request_rx.clone();
            let outcomes = outcome_tx.clone();
            let cancelled = Arc::clone(&cancelled);
            let handle = thread::Builder::new()
                .name(format!("peak-worker-{n}"))
                .spawn(move || run_worker(n, handler, requests, outcomes, cancelled))
                .map_err(|e| {
                    StudioError::WorkerCommunication(format!("Failed to spawn peak worker: {}", e))
                })?;
            handles.push(handle);
        }

        info!(threads, "Peak worker pool started");
        Ok(Self {
            request_tx: Some(request_tx),
            outcome_rx,
            cancelled,
            threads: handles,
        })
    }

    /// Queue a request. `Cancel` takes effect immediately for queued work.
    pub fn post(&self, request: WorkerRequest) -> Result<()> {
        if let WorkerRequest::Cancel { id } = request {
            debug!(%id, "Cancelling peak request");
            self.cancelled.lock().insert(id);
            return Ok(());
        }
        let tx = self.request_tx.as_ref().ok_or_else(|| {
            StudioError::WorkerCommunication("peak worker pool is shut down".into())
        })?;
        tx.send(request).map_err(|_| {
            StudioError::WorkerCommunication("all peak workers have exited".into())
        })
    }

    /// Outcomes in completion order.
    pub fn outcomes(&self) -> &Receiver<WorkerOutcome> {
        &self.outcome_rx
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Drop a cancel mark that no worker will consume.
    fn forget_cancel(&self, id: &CorrelationId) {
        self.cancelled.lock().remove(id);
    }

    /// Stop accepting requests, let queued work drain, and join workers.
    pub fn shutdown(&mut self) {
        if self.request_tx.take().is_none() {
            return;
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Peak worker exited by panic");
            }
        }
        info!("Peak worker pool stopped");
    }
}

impl Drop for PeakWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    n: usize,
    handler: RequestHandler,
    requests: Receiver<WorkerRequest>,
    outcomes: Sender<WorkerOutcome>,
    cancelled: CancelSet,
) {
    debug!(worker = n, "Peak worker started");
    while let Ok(request) = requests.recv() {
        let id = request.id().clone();
        if cancelled.lock().remove(&id) {
            debug!(worker = n, %id, "Skipping cancelled request");
            continue;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler(request))) {
            Ok(Some(response)) => WorkerOutcome::Response(response),
            Ok(None) => continue,
            Err(_) => {
                warn!(worker = n, %id, "Peak computation panicked");
                WorkerOutcome::Crashed(id.clone())
            }
        };

        if cancelled.lock().remove(&id) {
            continue;
        }
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    debug!(worker = n, "Peak worker stopped");
}

type ReplySender = oneshot::Sender<Result<PeakArray>>;

/// `None` once the router has stopped; no new requests are accepted then.
type PendingMap = Arc<Mutex<Option<HashMap<CorrelationId, ReplySender>>>>;

/// Request/response front end over a [`PeakWorkerPool`].
pub struct PeakClient {
    pool: Arc<PeakWorkerPool>,
    pending: PendingMap,
    router: Option<JoinHandle<()>>,
}

impl PeakClient {
    /// Spawn a pool of `threads` workers and its response router.
    pub fn spawn(threads: usize) -> Result<Self> {
        Self::with_pool(PeakWorkerPool::spawn(threads)?)
    }

    pub(crate) fn with_pool(pool: PeakWorkerPool) -> Result<Self> {
        let pool = Arc::new(pool);
        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));

        let outcomes = pool.outcomes().clone();
        let router_pending = Arc::clone(&pending);
        let cancelled = Arc::clone(&pool.cancelled);
        let router = thread::Builder::new()
            .name("peak-router".to_string())
            .spawn(move || route_outcomes(outcomes, router_pending, cancelled))
            .map_err(|e| {
                StudioError::WorkerCommunication(format!("Failed to spawn peak router: {}", e))
            })?;

        Ok(Self {
            pool,
            pending,
            router: Some(router),
        })
    }

    /// Dispatch a peak computation. The sample buffer moves to the worker.
    ///
    /// Invalid input fails here, before anything is queued.
    pub fn request(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        target_peaks: usize,
    ) -> Result<PendingPeaks> {
        if target_peaks == 0 {
            return Err(StudioError::InvalidArgument(
                "target peak count must be greater than zero".into(),
            ));
        }
        ensure_finite(&samples)?;

        let id = CorrelationId::generate();
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            let map = pending.as_mut().ok_or_else(|| {
                StudioError::WorkerCommunication("peak router has stopped".into())
            })?;
            map.insert(id.clone(), reply_tx);
        }

        let request = WorkerRequest::GeneratePeaks {
            id: id.clone(),
            audio_data: samples,
            sample_rate,
            target_peaks,
        };
        if let Err(e) = self.pool.post(request) {
            if let Some(map) = self.pending.lock().as_mut() {
                map.remove(&id);
            }
            return Err(e);
        }

        Ok(PendingPeaks {
            id,
            reply: reply_rx,
            pool: Arc::clone(&self.pool),
            pending: Arc::clone(&self.pending),
        })
    }

    /// Requests dispatched but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().as_ref().map_or(0, HashMap::len)
    }

    pub fn thread_count(&self) -> usize {
        self.pool.thread_count()
    }

    /// Cancel marks not yet consumed by a worker or the router.
    pub fn pending_cancels(&self) -> usize {
        self.pool.cancelled.lock().len()
    }
}

impl Drop for PeakClient {
    fn drop(&mut self) {
        // Outstanding PendingPeaks hold the pool; the router only stops
        // once every worker is gone.
        if let Some(pool) = Arc::get_mut(&mut self.pool) {
            pool.shutdown();
            if let Some(router) = self.router.take() {
                let _ = router.join();
            }
        }
    }
}

fn route_outcomes(outcomes: Receiver<WorkerOutcome>, pending: PendingMap, cancelled: CancelSet) {
    while let Ok(outcome) = outcomes.recv() {
        let waiter = pending
            .lock()
            .as_mut()
            .and_then(|map| map.remove(outcome.id()));
        match waiter {
            Some(tx) => {
                let _ = tx.send(outcome.into_result());
            }
            None => {
                // A cancel that arrived after the worker finished.
                cancelled.lock().remove(outcome.id());
                debug!(id = %outcome.id(), "Dropping outcome nobody is waiting for");
            }
        }
    }

    // Every worker is gone: fail whatever is still waiting.
    let orphaned = pending.lock().take().unwrap_or_default();
    if !orphaned.is_empty() {
        warn!(count = orphaned.len(), "Peak workers stopped with requests in flight");
    }
    for (_, tx) in orphaned {
        let _ = tx.send(Err(StudioError::WorkerCommunication(
            "peak workers stopped before replying".into(),
        )));
    }
}

/// A dispatched peak request awaiting its response.
pub struct PendingPeaks {
    id: CorrelationId,
    reply: oneshot::Receiver<Result<PeakArray>>,
    pool: Arc<PeakWorkerPool>,
    pending: PendingMap,
}

impl PendingPeaks {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Wait for the response.
    pub async fn wait(self) -> Result<PeakArray> {
        self.reply.await.unwrap_or_else(|_| Err(closed()))
    }

    /// Wait at most `timeout`; on expiry the request is abandoned.
    pub async fn wait_timeout(mut self, timeout: Duration) -> Result<PeakArray> {
        match tokio::time::timeout(timeout, &mut self.reply).await {
            Ok(reply) => reply.unwrap_or_else(|_| Err(closed())),
            Err(_) => {
                let id = self.id.clone();
                self.cancel();
                Err(StudioError::WorkerCommunication(format!(
                    "peak request {} timed out after {:?}",
                    id, timeout
                )))
            }
        }
    }

    /// Block the current thread for the response. Must not be called from
    /// inside an async runtime.
    pub fn blocking_wait(self) -> Result<PeakArray> {
        self.reply.blocking_recv().unwrap_or_else(|_| Err(closed()))
    }

    /// Poll without blocking. `None` while the worker is still busy.
    pub fn try_result(&mut self) -> Option<Result<PeakArray>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(closed())),
        }
    }

    /// Abandon interest. A queued request is skipped; a running one
    /// finishes and its response is dropped.
    pub fn cancel(self) {
        // Mark first: whoever sees the outcome after the pending entry is
        // gone (a worker or the router) clears the mark.
        let _ = self.pool.post(WorkerRequest::Cancel {
            id: self.id.clone(),
        });
        let was_pending = self
            .pending
            .lock()
            .as_mut()
            .and_then(|map| map.remove(&self.id))
            .is_some();
        if !was_pending {
            // Already answered; nothing will consume the mark.
            self.pool.forget_cancel(&self.id);
        }
    }
}

fn closed() -> StudioError {
    StudioError::WorkerCommunication("peak response channel closed".into())
}
