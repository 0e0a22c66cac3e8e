use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deferq_core::app::{EnqueueOptions, JobQueueBuilder, QueueConfig};
use deferq_core::domain::{JobRecord, PerformError, WorkerName};
use deferq_core::impls::InMemoryJobStore;
use deferq_core::ports::SystemClock;
use deferq_core::typed::{LifecycleHooks, Payload, PayloadType};

/// Failures left before `HelloPayload` starts succeeding.
static REMAINING_FAILURES: AtomicU32 = AtomicU32::new(2);

#[derive(Debug, Serialize, Deserialize)]
struct HelloPayload {
    name: String,
}

#[async_trait]
impl Payload for HelloPayload {
    async fn perform(&self) -> Result<(), PerformError> {
        let left = REMAINING_FAILURES.load(Ordering::Relaxed);
        if left > 0 {
            REMAINING_FAILURES.fetch_sub(1, Ordering::Relaxed);
            return Err(PerformError::new(format!(
                "intentional failure (left={left})"
            )));
        }

        println!("Hello, {}!", self.name);
        Ok(())
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("hello {}", self.name))
    }

    // retry after a second instead of the default backoff
    fn reschedule_at(&self, now: DateTime<Utc>, _attempts: u32) -> Option<DateTime<Utc>> {
        Some(now + Duration::seconds(1))
    }

    fn hooks(&self) -> Option<&dyn LifecycleHooks> {
        Some(self)
    }
}

#[async_trait]
impl LifecycleHooks for HelloPayload {
    async fn enqueue(&self, _job: &JobRecord) -> Result<(), PerformError> {
        info!(name = %self.name, "greeting queued");
        Ok(())
    }

    async fn error(&self, job: &JobRecord, error: &PerformError) -> Result<(), PerformError> {
        info!(attempts = job.attempts, %error, "greeting failed");
        Ok(())
    }
}

impl PayloadType for HelloPayload {
    const TYPE: &'static str = "deferq.demo.hello.v1";
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut config = QueueConfig::from_env().context("invalid DEFERQ_* configuration")?;
    // the demo should not idle for the production default
    if std::env::var("DEFERQ_SLEEP_DELAY_SECS").is_err() {
        config.sleep_delay = std::time::Duration::from_millis(200);
    }

    let store = Arc::new(InMemoryJobStore::new(Arc::new(SystemClock)));
    let queue = JobQueueBuilder::new()
        .config(config)
        .register::<HelloPayload>()
        .context("registering payload types")?
        .expect_payload_types(&[HelloPayload::TYPE])
        .build(store)
        .context("building job queue")?;

    let job = queue
        .enqueue(
            HelloPayload {
                name: "deferq".to_string(),
            },
            EnqueueOptions::new(),
        )
        .await
        .context("enqueueing greeting")?;
    info!(job_id = ?job.id, handler = job.handler(), "enqueued");

    let workers = queue.worker_group(&WorkerName::for_current_process(), 2);

    loop {
        let counts = queue.counts().await.context("reading queue counts")?;
        if counts.pending() == 0 {
            println!("counts: {counts:?}");
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = sleep(std::time::Duration::from_millis(50)) => {}
        }
    }

    workers.shutdown_and_join().await;
    Ok(())
}
