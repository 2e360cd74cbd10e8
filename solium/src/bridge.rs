//! Execution bridge: runs the economy step on a background worker thread.
//!
//! At most one computation is ever in flight. A request arriving while one is
//! queued replaces it (latest wins); the superseded request resolves with
//! [`TickOutcome::Skipped`] rather than an error. A response timeout or worker
//! death degrades the bridge to synchronous in-process computation, so the
//! orchestrator is never blocked by a wedged background computation and never
//! computes two conflicting worlds concurrently.

use solium_core::economy::EconomyStep;
use solium_core::effects::collect_overrides;
use solium_core::{TickResult, WorldState};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Identifies one `submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// How one submitted request resolved.
#[derive(Debug)]
pub enum TickOutcome {
    Computed(Box<TickResult>),
    /// Superseded by a later request before it was dispatched.
    Skipped,
    /// The worker terminated abnormally with this request pending.
    Failed(String),
}

enum WorkerRequest {
    Simulate { id: RequestId, snapshot: WorldState },
    Ping,
    Shutdown,
}

enum WorkerReply {
    Ready,
    Result { id: RequestId, result: Box<TickResult> },
    Error { id: RequestId, message: String },
    Pong,
}

fn worker_loop(
    economy: Arc<dyn EconomyStep>,
    requests: Receiver<WorkerRequest>,
    replies: Sender<WorkerReply>,
) {
    if replies.send(WorkerReply::Ready).is_err() {
        return;
    }
    while let Ok(request) = requests.recv() {
        match request {
            WorkerRequest::Simulate { id, snapshot } => {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let overrides = collect_overrides(&snapshot.effects);
                    economy.run(&snapshot, &overrides)
                }));
                let reply = match outcome {
                    Ok(result) => WorkerReply::Result {
                        id,
                        result: Box::new(result),
                    },
                    Err(panic) => {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "economy step panicked".to_string());
                        WorkerReply::Error { id, message }
                    }
                };
                if replies.send(reply).is_err() {
                    return;
                }
            }
            WorkerRequest::Ping => {
                if replies.send(WorkerReply::Pong).is_err() {
                    return;
                }
            }
            WorkerRequest::Shutdown => return,
        }
    }
}

/// The orchestrator-side handle.
pub struct ExecutionBridge {
    economy: Arc<dyn EconomyStep>,
    requests: Sender<WorkerRequest>,
    replies: Receiver<WorkerReply>,
    handle: Option<JoinHandle<()>>,
    timeout: Duration,
    next_id: u64,
    in_flight: Option<(RequestId, WorldState)>,
    queued: Option<(RequestId, WorldState)>,
    completed: VecDeque<(RequestId, TickOutcome)>,
    available: bool,
}

impl ExecutionBridge {
    /// Spawn the worker and wait for its ready signal.
    ///
    /// If the worker fails to come up within the timeout the bridge starts in
    /// degraded mode and every request computes synchronously.
    pub fn spawn(economy: Arc<dyn EconomyStep>, timeout: Duration) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let worker_economy = economy.clone();
        let handle = std::thread::Builder::new()
            .name("economy-worker".to_string())
            .spawn(move || worker_loop(worker_economy, request_rx, reply_tx))
            .ok();

        // Startup gets a generous grace period even when the per-response
        // timeout is tight.
        let startup = timeout.max(Duration::from_secs(1));
        let available = handle.is_some()
            && matches!(reply_rx.recv_timeout(startup), Ok(WorkerReply::Ready));
        if !available {
            log::warn!("Economy worker did not start; running synchronously");
        }

        Self {
            economy,
            requests: request_tx,
            replies: reply_rx,
            handle,
            timeout,
            next_id: 0,
            in_flight: None,
            queued: None,
            completed: VecDeque::new(),
            available,
        }
    }

    /// Whether the background context is still usable.
    #[allow(dead_code)] // frontends surface degraded mode to the user
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Liveness check: send a ping and wait for the pong.
    ///
    /// Simulation replies arriving in the meantime are processed normally.
    pub fn ping(&mut self) -> bool {
        if !self.available || self.requests.send(WorkerRequest::Ping).is_err() {
            return false;
        }
        loop {
            match self.replies.recv_timeout(self.timeout) {
                Ok(WorkerReply::Pong) => return true,
                Ok(reply) => self.handle_reply(reply),
                Err(_) => {
                    self.degrade("worker unresponsive to ping");
                    return false;
                }
            }
        }
    }

    /// Submit a snapshot for computation.
    ///
    /// Never blocks. At most one request is in flight; a second submission
    /// while one is queued supersedes the queued one, which resolves
    /// [`TickOutcome::Skipped`].
    pub fn submit(&mut self, snapshot: WorldState) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        self.drain_replies();

        if !self.available {
            let result = self.compute_sync(&snapshot);
            self.completed
                .push_back((id, TickOutcome::Computed(Box::new(result))));
            return id;
        }

        if self.in_flight.is_none() {
            self.dispatch(id, snapshot);
        } else {
            if let Some((superseded, _)) = self.queued.take() {
                log::debug!("Request {:?} superseded before dispatch", superseded);
                self.completed.push_back((superseded, TickOutcome::Skipped));
            }
            self.queued = Some((id, snapshot));
        }
        id
    }

    /// Collect every request that has resolved so far. Never blocks.
    pub fn poll(&mut self) -> Vec<(RequestId, TickOutcome)> {
        self.drain_replies();
        self.completed.drain(..).collect()
    }

    /// Block until the given request resolves, honoring the response timeout.
    pub fn wait_for(&mut self, id: RequestId) -> TickOutcome {
        loop {
            self.drain_replies();
            if let Some(pos) = self.completed.iter().position(|(rid, _)| *rid == id) {
                if let Some((_, outcome)) = self.completed.remove(pos) {
                    return outcome;
                }
            }
            let pending = self.in_flight.as_ref().map(|(rid, _)| *rid) == Some(id)
                || self.queued.as_ref().map(|(rid, _)| *rid) == Some(id);
            if !pending {
                log::warn!("Waited on unknown request {:?}", id);
                return TickOutcome::Skipped;
            }
            match self.replies.recv_timeout(self.timeout) {
                Ok(reply) => self.handle_reply(reply),
                Err(RecvTimeoutError::Timeout) => {
                    // Wedged worker: resolve everything pending in-process.
                    self.degrade("worker response timed out");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.reject_pending("worker terminated");
                }
            }
        }
    }

    fn dispatch(&mut self, id: RequestId, snapshot: WorldState) {
        let message = WorkerRequest::Simulate {
            id,
            snapshot: snapshot.clone(),
        };
        if self.requests.send(message).is_ok() {
            self.in_flight = Some((id, snapshot));
        } else {
            self.available = false;
            let result = self.compute_sync(&snapshot);
            self.completed
                .push_back((id, TickOutcome::Computed(Box::new(result))));
        }
    }

    fn dispatch_queued(&mut self) {
        if self.in_flight.is_none() {
            if let Some((id, snapshot)) = self.queued.take() {
                if self.available {
                    self.dispatch(id, snapshot);
                } else {
                    let result = self.compute_sync(&snapshot);
                    self.completed
                        .push_back((id, TickOutcome::Computed(Box::new(result))));
                }
            }
        }
    }

    fn drain_replies(&mut self) {
        loop {
            match self.replies.try_recv() {
                Ok(reply) => self.handle_reply(reply),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    if self.available || self.in_flight.is_some() || self.queued.is_some() {
                        self.reject_pending("worker terminated");
                    }
                    break;
                }
            }
        }
    }

    fn handle_reply(&mut self, reply: WorkerReply) {
        match reply {
            WorkerReply::Ready | WorkerReply::Pong => {}
            WorkerReply::Result { id, result } => {
                match self.in_flight.take() {
                    Some((pending, _)) if pending == id => {
                        self.completed.push_back((id, TickOutcome::Computed(result)));
                    }
                    other => {
                        // Stale reply from before a timeout fallback.
                        log::debug!("Discarding stale result for {:?}", id);
                        self.in_flight = other;
                    }
                }
                self.dispatch_queued();
            }
            WorkerReply::Error { id, message } => {
                match self.in_flight.take() {
                    Some((pending, snapshot)) if pending == id => {
                        // The worker survived; only this request failed.
                        // Recover it in-process.
                        log::warn!("Economy step failed in worker: {message}; recomputing");
                        let result = self.compute_sync(&snapshot);
                        self.completed
                            .push_back((id, TickOutcome::Computed(Box::new(result))));
                    }
                    other => {
                        log::debug!("Discarding stale error for {:?}: {message}", id);
                        self.in_flight = other;
                    }
                }
                self.dispatch_queued();
            }
        }
    }

    /// Mark the worker unusable and resolve everything pending in-process.
    fn degrade(&mut self, reason: &str) {
        log::warn!("Degrading to synchronous execution: {reason}");
        self.available = false;
        if let Some((id, snapshot)) = self.in_flight.take() {
            let result = self.compute_sync(&snapshot);
            self.completed
                .push_back((id, TickOutcome::Computed(Box::new(result))));
        }
        self.dispatch_queued();
    }

    /// Abnormal termination: pending and queued requests reject.
    fn reject_pending(&mut self, reason: &str) {
        log::error!("Economy worker terminated abnormally");
        self.available = false;
        if let Some((id, _)) = self.in_flight.take() {
            self.completed
                .push_back((id, TickOutcome::Failed(reason.to_string())));
        }
        if let Some((id, _)) = self.queued.take() {
            self.completed
                .push_back((id, TickOutcome::Failed(reason.to_string())));
        }
    }

    fn compute_sync(&self, snapshot: &WorldState) -> TickResult {
        let overrides = collect_overrides(&snapshot.effects);
        self.economy.run(snapshot, &overrides)
    }
}

impl Drop for ExecutionBridge {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solium_core::effects::ModifierOverrides;
    use solium_core::testing::WorldStateBuilder;
    use solium_core::Stratum;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Economy stub that records how many times it ran and optionally sleeps.
    struct StubEconomy {
        runs: AtomicU64,
        delay: Duration,
    }

    impl StubEconomy {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicU64::new(0),
                delay,
            })
        }
    }

    impl EconomyStep for StubEconomy {
        fn run(&self, state: &WorldState, _overrides: &ModifierOverrides) -> TickResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            let mut result = TickResult::default();
            result.stability = state.stability;
            result.tax_collected = state.day as f64;
            result
        }
    }

    /// Panics on its first call only, so the in-process retry succeeds.
    struct PanicOnceEconomy {
        runs: AtomicU64,
    }

    impl EconomyStep for PanicOnceEconomy {
        fn run(&self, state: &WorldState, _overrides: &ModifierOverrides) -> TickResult {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("transient failure");
            }
            let mut result = TickResult::default();
            result.tax_collected = state.day as f64;
            result
        }
    }

    fn snapshot(day: u64) -> WorldState {
        let mut state = WorldStateBuilder::new()
            .with_stratum(Stratum::Peasants, 10_000.0, 1_000.0, 10.0)
            .build();
        state.day = day;
        state
    }

    #[test]
    fn test_single_request_computes() {
        let economy = StubEconomy::new(Duration::ZERO);
        let mut bridge = ExecutionBridge::spawn(economy.clone(), Duration::from_secs(2));
        assert!(bridge.is_available());

        let id = bridge.submit(snapshot(7));
        match bridge.wait_for(id) {
            TickOutcome::Computed(result) => assert_eq!(result.tax_collected, 7.0),
            other => panic!("expected computed result, got {other:?}"),
        }
        assert_eq!(economy.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_overlapping_requests_coalesce_latest_wins() {
        // Slow worker so all three submissions overlap.
        let economy = StubEconomy::new(Duration::from_millis(100));
        let mut bridge = ExecutionBridge::spawn(economy.clone(), Duration::from_secs(5));

        let first = bridge.submit(snapshot(1));
        let second = bridge.submit(snapshot(2));
        let third = bridge.submit(snapshot(3));

        match bridge.wait_for(second) {
            TickOutcome::Skipped => {}
            other => panic!("superseded request must skip, got {other:?}"),
        }
        match bridge.wait_for(first) {
            TickOutcome::Computed(result) => assert_eq!(result.tax_collected, 1.0),
            other => panic!("in-flight request must compute, got {other:?}"),
        }
        match bridge.wait_for(third) {
            TickOutcome::Computed(result) => assert_eq!(result.tax_collected, 3.0),
            other => panic!("latest request must compute, got {other:?}"),
        }
        // Exactly the two non-skipped requests ran.
        assert_eq!(economy.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_falls_back_to_sync() {
        // Worker takes far longer than the response timeout.
        let economy = StubEconomy::new(Duration::from_millis(300));
        let mut bridge = ExecutionBridge::spawn(economy.clone(), Duration::from_millis(30));

        let id = bridge.submit(snapshot(4));
        match bridge.wait_for(id) {
            TickOutcome::Computed(result) => assert_eq!(result.tax_collected, 4.0),
            other => panic!("timeout must resolve via sync fallback, got {other:?}"),
        }
        assert!(!bridge.is_available());

        // Subsequent submissions compute in-process immediately.
        let id = bridge.submit(snapshot(5));
        match bridge.wait_for(id) {
            TickOutcome::Computed(result) => assert_eq!(result.tax_collected, 5.0),
            other => panic!("degraded bridge must still compute, got {other:?}"),
        }
    }

    #[test]
    fn test_worker_panic_recovers_in_process() {
        let economy = Arc::new(PanicOnceEconomy {
            runs: AtomicU64::new(0),
        });
        let mut bridge = ExecutionBridge::spawn(economy.clone(), Duration::from_secs(2));

        // The worker's panic is caught and reported as an error; the bridge
        // recomputes the same snapshot in-process and the caller still gets a
        // result.
        let id = bridge.submit(snapshot(6));
        match bridge.wait_for(id) {
            TickOutcome::Computed(result) => assert_eq!(result.tax_collected, 6.0),
            other => panic!("error reply must recover via retry, got {other:?}"),
        }
        assert_eq!(economy.runs.load(Ordering::SeqCst), 2);
        assert!(bridge.is_available(), "a per-request panic does not kill the worker");
    }

    #[test]
    fn test_ping_healthy_worker() {
        let economy = StubEconomy::new(Duration::ZERO);
        let mut bridge = ExecutionBridge::spawn(economy, Duration::from_secs(2));
        assert!(bridge.ping());

        // A ping sent while a result is pending still gets its pong, and the
        // simulation reply is not lost.
        let id = bridge.submit(snapshot(2));
        assert!(bridge.ping());
        assert!(matches!(bridge.wait_for(id), TickOutcome::Computed(_)));
    }

    #[test]
    fn test_ping_degraded_bridge() {
        let economy = StubEconomy::new(Duration::from_millis(300));
        let mut bridge = ExecutionBridge::spawn(economy, Duration::from_millis(30));

        // Force degradation through a response timeout.
        let id = bridge.submit(snapshot(1));
        let _ = bridge.wait_for(id);
        assert!(!bridge.is_available());
        assert!(!bridge.ping());
    }

    #[test]
    fn test_results_via_poll() {
        let economy = StubEconomy::new(Duration::ZERO);
        let mut bridge = ExecutionBridge::spawn(economy, Duration::from_secs(2));

        let id = bridge.submit(snapshot(9));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            let resolved = bridge.poll();
            if let Some((rid, outcome)) = resolved.into_iter().next() {
                assert_eq!(rid, id);
                assert!(matches!(outcome, TickOutcome::Computed(_)));
                break;
            }
            assert!(std::time::Instant::now() < deadline, "result never arrived");
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
