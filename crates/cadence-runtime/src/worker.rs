//! TriggerWorker - the queue consumer loop.
//!
//! One logical worker invocation per delivered trigger: receive, hand to the
//! engine, acknowledge. Acknowledgement happens for every engine outcome,
//! benign no-ops included; only an engine error leaves the delivery unacked,
//! and the transport's visibility timeout then redelivers it. That redelivery
//! is the whole retry policy: the worker never retries in place.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cadence_core::engine::PlanEngine;
use cadence_core::queue::{QueueError, TriggerQueue};

/// Consumer loop tuning
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a claimed trigger stays invisible before redelivery
    pub visibility_timeout: Duration,
    /// How long to sleep when the queue is empty
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// TriggerWorker - drains the trigger queue into the plan engine
pub struct TriggerWorker {
    queue: Arc<dyn TriggerQueue>,
    engine: Arc<PlanEngine>,
    config: WorkerConfig,
}

impl TriggerWorker {
    /// Create a worker with default tuning
    pub fn new(queue: Arc<dyn TriggerQueue>, engine: Arc<PlanEngine>) -> Self {
        Self::with_config(queue, engine, WorkerConfig::default())
    }

    /// Create a worker with explicit tuning
    pub fn with_config(
        queue: Arc<dyn TriggerQueue>,
        engine: Arc<PlanEngine>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            engine,
            config,
        }
    }

    /// Process at most one delivery.
    ///
    /// Returns `true` when a delivery was handled (successfully or not) and
    /// `false` when the queue had nothing due. Errors are transport errors
    /// from the queue itself; engine failures are logged and expressed by
    /// leaving the delivery unacknowledged.
    pub async fn tick(&self) -> Result<bool, QueueError> {
        let Some(delivery) = self.queue.receive(self.config.visibility_timeout).await? else {
            return Ok(false);
        };

        match self.engine.handle_trigger(&delivery.trigger).await {
            Ok(outcome) => {
                tracing::debug!(
                    plan_id = %delivery.trigger.plan_id,
                    owner = %delivery.trigger.owner,
                    attempt = delivery.attempt,
                    outcome = ?outcome,
                    "trigger processed"
                );
                self.queue.acknowledge(&delivery).await?;
            }
            Err(err) => {
                // No ack: the delivery becomes visible again after its
                // visibility window and the attempt repeats from scratch.
                tracing::error!(
                    plan_id = %delivery.trigger.plan_id,
                    owner = %delivery.trigger.owner,
                    attempt = delivery.attempt,
                    error = %err,
                    "trigger processing failed; leaving delivery for redelivery"
                );
            }
        }
        Ok(true)
    }

    /// Run the consumer loop until the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            visibility_timeout_ms = self.config.visibility_timeout.as_millis() as u64,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "trigger worker started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let handled = match self.tick().await {
                Ok(handled) => handled,
                Err(err) => {
                    tracing::error!(error = %err, "trigger queue unavailable");
                    false
                }
            };

            if handled {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("trigger worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    use cadence_core::executor::{ExecutorError, StepExecutor, StepInvocation};
    use cadence_core::queue::DelayScheduler;
    use cadence_core::store::PlanStore;
    use cadence_core::types::{Plan, StepSpec};
    use cadence_stores::{InMemoryDelayQueue, InMemoryPlanStore};

    struct CountingExecutor {
        calls: AtomicUsize,
        failures_left: AtomicUsize,
    }

    impl CountingExecutor {
        fn reliable() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(0),
            }
        }

        fn failing_first(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(failures),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StepExecutor for CountingExecutor {
        async fn execute(&self, invocation: StepInvocation) -> Result<String, ExecutorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ExecutorError::Failed("transient failure".to_string()));
            }
            Ok(format!("done[{}]: {}", call, invocation.description))
        }
    }

    struct Fixture {
        store: Arc<InMemoryPlanStore>,
        queue: Arc<InMemoryDelayQueue>,
        executor: Arc<CountingExecutor>,
        worker: TriggerWorker,
    }

    fn fixture(executor: CountingExecutor, config: WorkerConfig) -> Fixture {
        let store = Arc::new(InMemoryPlanStore::new());
        let queue = Arc::new(InMemoryDelayQueue::new());
        let executor = Arc::new(executor);
        let engine = Arc::new(PlanEngine::new(
            store.clone(),
            queue.clone(),
            executor.clone(),
        ));
        let worker = TriggerWorker::with_config(queue.clone(), engine, config);
        Fixture {
            store,
            queue,
            executor,
            worker,
        }
    }

    fn quick_config() -> WorkerConfig {
        WorkerConfig {
            visibility_timeout: Duration::from_millis(40),
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn seed_plan(fixture: &Fixture, specs: Vec<StepSpec>) -> Plan {
        let plan = Plan::new("Onboarding", "user-1", "agent-1", specs);
        fixture.store.create(&plan).await.unwrap();
        let first_delay = plan.steps[0].delay;
        fixture
            .queue
            .schedule(plan.trigger(), first_delay)
            .await
            .unwrap();
        plan
    }

    #[test]
    fn test_tick_advances_one_step_and_acknowledges() {
        tokio_test::block_on(async {
            let fixture = fixture(CountingExecutor::reliable(), quick_config());
            let plan = seed_plan(
                &fixture,
                vec![
                    StepSpec::new("send welcome", Duration::ZERO),
                    StepSpec::new("check in", Duration::from_millis(30)),
                ],
            )
            .await;

            assert!(fixture.worker.tick().await.unwrap());

            let stored = fixture
                .store
                .get(&plan.id, &plan.owner)
                .await
                .unwrap()
                .unwrap();
            assert!(stored.steps[0].completed);
            assert_eq!(stored.history.len(), 1);

            // The next step's trigger exists but is not yet due.
            assert_eq!(fixture.queue.pending_len(), 1);
            assert!(!fixture.worker.tick().await.unwrap());
        });
    }

    #[test]
    fn test_empty_queue_tick_is_idle() {
        tokio_test::block_on(async {
            let fixture = fixture(CountingExecutor::reliable(), quick_config());
            assert!(!fixture.worker.tick().await.unwrap());
            assert_eq!(fixture.executor.call_count(), 0);
        });
    }

    #[test]
    fn test_failed_attempt_redelivers_and_then_succeeds() {
        tokio_test::block_on(async {
            let fixture = fixture(CountingExecutor::failing_first(1), quick_config());
            let plan = seed_plan(
                &fixture,
                vec![StepSpec::new("send welcome", Duration::ZERO)],
            )
            .await;

            // First attempt fails; the delivery stays in flight, unacked.
            assert!(fixture.worker.tick().await.unwrap());
            let stored = fixture
                .store
                .get(&plan.id, &plan.owner)
                .await
                .unwrap()
                .unwrap();
            assert!(stored.steps[0].is_pending());
            assert!(stored.history.is_empty());

            // Not yet visible again.
            assert!(!fixture.worker.tick().await.unwrap());

            // After the visibility window the redelivery succeeds.
            sleep(Duration::from_millis(50)).await;
            assert!(fixture.worker.tick().await.unwrap());

            let stored = fixture
                .store
                .get(&plan.id, &plan.owner)
                .await
                .unwrap()
                .unwrap();
            assert!(stored.steps[0].completed);
            assert_eq!(stored.history.len(), 1);
            assert_eq!(fixture.executor.call_count(), 2);
        });
    }

    #[test]
    fn test_run_drives_a_plan_to_quiescence_and_stops_on_cancel() {
        tokio_test::block_on(async {
            let fixture = fixture(CountingExecutor::reliable(), quick_config());
            let plan = seed_plan(
                &fixture,
                vec![
                    StepSpec::new("send welcome", Duration::ZERO),
                    StepSpec::new("check in", Duration::from_millis(30)),
                ],
            )
            .await;

            let shutdown = CancellationToken::new();
            let store = fixture.store.clone();
            let worker = fixture.worker;
            let token = shutdown.clone();
            let handle = tokio::spawn(async move { worker.run(token).await });

            // Both steps advance across the inter-step delay.
            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            loop {
                let stored = store.get(&plan.id, &plan.owner).await.unwrap().unwrap();
                if stored.is_done() {
                    break;
                }
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "plan did not quiesce in time"
                );
                sleep(Duration::from_millis(10)).await;
            }

            let stored = store.get(&plan.id, &plan.owner).await.unwrap().unwrap();
            assert_eq!(stored.history.len(), 2);

            // Terminal quiescence: nothing left in the queue.
            assert_eq!(fixture.queue.pending_len(), 0);

            shutdown.cancel();
            handle.await.unwrap();
            assert_eq!(fixture.executor.call_count(), 2);
        });
    }
}
