//! Bootstrap helpers for starting Cadence from a single YAML config.
//!
//! Everything is wired by explicit construction: the chosen backends and the
//! caller-supplied step executor go into the engine, worker, and API as
//! plain constructor arguments. There is no ambient registry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use cadence_api::PlanApi;
use cadence_config::{init_tracing_if_needed, load_config, CadenceConfig, ConfigError};
use cadence_core::engine::PlanEngine;
use cadence_core::executor::StepExecutor;
use cadence_core::queue::{DelayScheduler, QueueError, TriggerQueue};
use cadence_core::store::{PlanStore, StoreError};
use cadence_stores::{InMemoryDelayQueue, InMemoryPlanStore, RedisDelayQueue, RedisPlanStore};

use crate::worker::{TriggerWorker, WorkerConfig};

/// Runtime bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("unsupported backend '{0}' for {1}")]
    UnsupportedBackend(String, &'static str),
    #[error("missing connection_url for {0}")]
    MissingConnectionUrl(&'static str),
}

/// Running app bundle created from unified config.
pub struct PlanApp {
    pub api: PlanApi,
    pub engine: Arc<PlanEngine>,
    pub worker: TriggerWorker,
}

impl PlanApp {
    /// Build the app bundle from an already-loaded config.
    pub fn from_config(
        config: &CadenceConfig,
        executor: Arc<dyn StepExecutor>,
    ) -> Result<Self, BootstrapError> {
        init_tracing_if_needed(&config.observability);

        let store = build_store(config)?;
        let (scheduler, trigger_queue) = build_queue(config)?;

        let engine = Arc::new(PlanEngine::new(
            store.clone(),
            scheduler.clone(),
            executor,
        ));
        let worker = TriggerWorker::with_config(
            trigger_queue,
            engine.clone(),
            WorkerConfig {
                visibility_timeout: Duration::from_secs(config.worker.visibility_timeout_secs),
                poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
            },
        );
        let api = PlanApi::new(store, scheduler);

        tracing::info!(
            app = %config.app.name,
            store_backend = %config.store.backend,
            queue_backend = %config.queue.backend,
            "plan app wired"
        );

        Ok(Self {
            api,
            engine,
            worker,
        })
    }

    /// Load config from a YAML file and build the app bundle.
    pub fn from_config_path(
        path: impl AsRef<Path>,
        executor: Arc<dyn StepExecutor>,
    ) -> Result<Self, BootstrapError> {
        let config = load_config(path.as_ref())?;
        Self::from_config(&config, executor)
    }
}

fn build_store(config: &CadenceConfig) -> Result<Arc<dyn PlanStore>, BootstrapError> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryPlanStore::new())),
        "redis" => {
            let url = config
                .store
                .connection_url
                .as_deref()
                .ok_or(BootstrapError::MissingConnectionUrl("store"))?;
            Ok(Arc::new(RedisPlanStore::new(url, &config.store.key_prefix)?))
        }
        other => Err(BootstrapError::UnsupportedBackend(
            other.to_string(),
            "store",
        )),
    }
}

#[allow(clippy::type_complexity)]
fn build_queue(
    config: &CadenceConfig,
) -> Result<(Arc<dyn DelayScheduler>, Arc<dyn TriggerQueue>), BootstrapError> {
    match config.queue.backend.as_str() {
        "memory" => {
            let queue = Arc::new(InMemoryDelayQueue::new());
            let scheduler: Arc<dyn DelayScheduler> = queue.clone();
            let consumer: Arc<dyn TriggerQueue> = queue;
            Ok((scheduler, consumer))
        }
        "redis" => {
            let url = config
                .queue
                .connection_url
                .as_deref()
                .ok_or(BootstrapError::MissingConnectionUrl("queue"))?;
            let queue = Arc::new(RedisDelayQueue::new(url, &config.queue.key_prefix)?);
            let scheduler: Arc<dyn DelayScheduler> = queue.clone();
            let consumer: Arc<dyn TriggerQueue> = queue;
            Ok((scheduler, consumer))
        }
        other => Err(BootstrapError::UnsupportedBackend(
            other.to_string(),
            "queue",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use cadence_core::executor::{ExecutorError, StepInvocation};
    use cadence_core::types::StepSpec;

    struct EchoExecutor;

    #[async_trait]
    impl StepExecutor for EchoExecutor {
        async fn execute(&self, invocation: StepInvocation) -> Result<String, ExecutorError> {
            Ok(invocation.description)
        }
    }

    #[test]
    fn test_memory_backends_wire_a_working_app() {
        tokio_test::block_on(async {
            let config = CadenceConfig::default();
            let app = PlanApp::from_config(&config, Arc::new(EchoExecutor)).unwrap();

            let plan = app
                .api
                .create_plan(
                    "Onboarding",
                    "user-1",
                    "agent-1",
                    vec![StepSpec::new("send welcome", Duration::ZERO)],
                )
                .await
                .unwrap();

            // The creation trigger is already armed; one tick finishes the plan.
            assert!(app.worker.tick().await.unwrap());
            let stored = app.api.get_plan(&plan.id, &plan.owner).await.unwrap().unwrap();
            assert!(stored.is_done());
            assert_eq!(stored.history, vec!["send welcome".to_string()]);
        });
    }

    #[test]
    fn test_unknown_store_backend_is_rejected() {
        let mut config = CadenceConfig::default();
        config.store.backend = "cosmos".to_string();

        let result = PlanApp::from_config(&config, Arc::new(EchoExecutor));
        assert!(matches!(
            result,
            Err(BootstrapError::UnsupportedBackend(_, "store"))
        ));
    }

    #[test]
    fn test_redis_queue_without_url_is_rejected() {
        let mut config = CadenceConfig::default();
        config.queue.backend = "redis".to_string();

        let result = PlanApp::from_config(&config, Arc::new(EchoExecutor));
        assert!(matches!(
            result,
            Err(BootstrapError::MissingConnectionUrl("queue"))
        ));
    }
}
