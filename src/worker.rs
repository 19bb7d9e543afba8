//! Isolated solver contexts running on blocking threads.
//!
//! Each worker owns one [`SolverContext`] and receives messages over its own
//! channel. Responses come back on a shared channel and are matched to
//! outstanding requests by `requestId`.

use crate::error::AppError;
use hexwfc_core::{Request, Response, SolveRequest, SolveResponse, SolverContext};
use hexwfc_rules::Catalog;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const QUEUE_DEPTH: usize = 64;

/// A message for one worker, with the flag that cancels it.
#[derive(Debug)]
enum Job {
    Init { seed: u64 },
    Solve {
        request: SolveRequest,
        cancel: Arc<AtomicBool>,
    },
}

#[derive(Debug)]
struct Pending {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

/// A fixed set of solver contexts.
pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Job>>,
    responses: mpsc::UnboundedReceiver<Response>,
    handles: Vec<JoinHandle<()>>,
    next_worker: usize,
}

impl WorkerPool {
    /// Spawns `workers` contexts over `catalog`. Worker `i` is seeded with
    /// `seed + i`. The response channel is unbounded so a worker never waits
    /// on the dispatcher.
    pub fn spawn(workers: usize, catalog: &Arc<Catalog>, seed: u64) -> Self {
        let workers = workers.max(1);
        let (response_tx, responses) = mpsc::unbounded_channel();
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
            let context = SolverContext::new(Arc::clone(catalog), seed.wrapping_add(index as u64));
            let response_tx = response_tx.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                run_worker(index, context, rx, &response_tx);
            }));
            senders.push(tx);
        }
        info!("Spawned {} solver contexts (base seed {})", workers, seed);

        Self {
            senders,
            responses,
            handles,
            next_worker: 0,
        }
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Runs every message and collects one response per solve request, in
    /// request order.
    ///
    /// `Init` messages reseed every worker, offset by worker index. A solve
    /// still outstanding when `timeout` has passed since it was dispatched is
    /// cancelled and answered with an error; its late response is
    /// discarded.
    pub async fn run(
        &mut self,
        messages: Vec<Request>,
        timeout: Option<Duration>,
    ) -> Result<Vec<SolveResponse>, AppError> {
        let mut pending: HashMap<u64, Pending> = HashMap::new();
        let mut order = Vec::new();

        for message in messages {
            match message {
                Request::Init { seed } => {
                    for (index, sender) in self.senders.iter().enumerate() {
                        let job = Job::Init {
                            seed: seed.wrapping_add(index as u64),
                        };
                        sender
                            .send(job)
                            .await
                            .map_err(|_| AppError::Worker(format!("worker {index} stopped")))?;
                    }
                }
                Request::Solve(request) => {
                    let id = request.request_id;
                    if pending.contains_key(&id) {
                        warn!("Duplicate request id {id}; message skipped");
                        continue;
                    }
                    let cancel = Arc::new(AtomicBool::new(false));
                    let index = self.next_worker;
                    self.next_worker = (self.next_worker + 1) % self.senders.len();
                    debug!("Dispatching request {id} to worker {index}");
                    self.senders[index]
                        .send(Job::Solve {
                            request,
                            cancel: Arc::clone(&cancel),
                        })
                        .await
                        .map_err(|_| AppError::Worker(format!("worker {index} stopped")))?;
                    pending.insert(
                        id,
                        Pending {
                            cancel,
                            deadline: timeout.map(|t| Instant::now() + t),
                        },
                    );
                    order.push(id);
                }
            }
        }

        let mut finished: HashMap<u64, SolveResponse> = HashMap::new();
        while !pending.is_empty() {
            expire(&mut pending, &mut finished, timeout);
            if pending.is_empty() {
                break;
            }
            let next_deadline = pending.values().filter_map(|p| p.deadline).min();
            let received = match next_deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.responses.recv()).await {
                        Ok(received) => received,
                        Err(_) => continue,
                    }
                }
                None => self.responses.recv().await,
            };
            let Some(Response::Result(response)) = received else {
                return Err(AppError::Worker(
                    "all workers stopped with requests outstanding".to_owned(),
                ));
            };
            let id = response.request_id;
            if pending.remove(&id).is_some() {
                finished.insert(id, response);
            } else {
                warn!("Discarding response for stale or unknown request {id}");
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| finished.remove(&id))
            .collect())
    }

    /// Closes every worker queue and waits for the threads to exit.
    pub async fn shutdown(self) -> Result<(), AppError> {
        drop(self.senders);
        for handle in self.handles {
            handle
                .await
                .map_err(|e| AppError::Worker(format!("worker panicked: {e}")))?;
        }
        Ok(())
    }
}

/// Cancels and answers every request whose deadline has passed.
fn expire(
    pending: &mut HashMap<u64, Pending>,
    finished: &mut HashMap<u64, SolveResponse>,
    timeout: Option<Duration>,
) {
    let now = Instant::now();
    let expired: Vec<u64> = pending
        .iter()
        .filter(|(_, p)| p.deadline.is_some_and(|d| d <= now))
        .map(|(&id, _)| id)
        .collect();
    for id in expired {
        if let Some(entry) = pending.remove(&id) {
            entry.cancel.store(true, Ordering::Relaxed);
            if let Some(timeout) = timeout {
                warn!(
                    "Request {id} timed out after {}; cancelling",
                    humantime::format_duration(timeout)
                );
            }
            finished.insert(id, SolveResponse::from_error(id, "solve timed out"));
        }
    }
}

fn run_worker(
    index: usize,
    mut context: SolverContext,
    mut jobs: mpsc::Receiver<Job>,
    responses: &mpsc::UnboundedSender<Response>,
) {
    debug!("Worker {index} started");
    while let Some(job) = jobs.blocking_recv() {
        match job {
            Job::Init { seed } => context.reseed(seed),
            Job::Solve { request, cancel } => {
                if cancel.load(Ordering::Relaxed) {
                    debug!("Worker {index} skipping cancelled request {}", request.request_id);
                    continue;
                }
                let response = context.solve(&request, Some(cancel));
                if responses.send(Response::Result(response)).is_err() {
                    break;
                }
            }
        }
    }
    debug!("Worker {index} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexwfc_core::{CubeCoord, SolveOptions};

    fn solve(id: u64, radius: u32) -> Request {
        Request::Solve(SolveRequest {
            request_id: id,
            solve_cells: CubeCoord::within_radius(CubeCoord::ORIGIN, radius),
            fixed_cells: Vec::new(),
            options: SolveOptions::default(),
        })
    }

    #[tokio::test]
    async fn test_responses_follow_request_order() {
        let mut pool = WorkerPool::spawn(3, &Catalog::builtin(), 1);
        let responses = pool
            .run(vec![solve(7, 1), solve(2, 2), solve(5, 1), solve(1, 0)], None)
            .await
            .unwrap();
        pool.shutdown().await.unwrap();

        let ids: Vec<u64> = responses.iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![7, 2, 5, 1]);
        assert!(responses.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_skipped() {
        let mut pool = WorkerPool::spawn(1, &Catalog::builtin(), 1);
        let responses = pool
            .run(vec![solve(4, 1), solve(4, 1)], None)
            .await
            .unwrap();
        pool.shutdown().await.unwrap();
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn test_init_makes_runs_reproducible() {
        let run = |seed: u64| async move {
            let mut pool = WorkerPool::spawn(2, &Catalog::builtin(), 99);
            let responses = pool
                .run(vec![Request::Init { seed }, solve(1, 2), solve(2, 2)], None)
                .await
                .unwrap();
            pool.shutdown().await.unwrap();
            responses
        };
        assert_eq!(run(12).await, run(12).await);
    }

    #[tokio::test]
    async fn test_zero_timeout_answers_with_error() {
        let mut pool = WorkerPool::spawn(1, &Catalog::builtin(), 1);
        let responses = pool
            .run(vec![solve(1, 6), solve(2, 6)], Some(Duration::ZERO))
            .await
            .unwrap();
        pool.shutdown().await.unwrap();

        assert_eq!(responses.len(), 2);
        for response in &responses {
            assert!(!response.success);
            assert_eq!(response.error.as_deref(), Some("solve timed out"));
        }
    }
}
