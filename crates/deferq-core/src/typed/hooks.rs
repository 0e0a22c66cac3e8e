//! HookDispatcher: runs a payload with its lifecycle hooks around it.
//!
//! Hooks are looked up through `Payload::hooks`. A hook whose payload cannot
//! be decoded is skipped; the decode failure itself surfaces from the
//! execution path, never from a hook.

use std::sync::Arc;

use tracing::{debug, warn};

use super::PayloadCodec;
use crate::domain::{JobRecord, PerformError, QueueError};

#[derive(Debug, Clone, Copy)]
pub enum Hook<'e> {
    Enqueue,
    Before,
    Success,
    Error(&'e PerformError),
    After,
}

impl Hook<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Hook::Enqueue => "enqueue",
            Hook::Before => "before",
            Hook::Success => "success",
            Hook::Error(_) => "error",
            Hook::After => "after",
        }
    }
}

#[derive(Clone)]
pub struct HookDispatcher {
    codec: Arc<PayloadCodec>,
}

impl HookDispatcher {
    pub fn new(codec: Arc<PayloadCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    /// Invoke one hook on the job's payload, if it has that hook.
    pub async fn hook(&self, job: &JobRecord, hook: Hook<'_>) -> Result<(), PerformError> {
        let payload = match job.payload_object(&self.codec) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(hook = hook.name(), error = %e, "skipping hook, payload not decodable");
                return Ok(());
            }
        };
        let Some(hooks) = payload.hooks() else {
            return Ok(());
        };

        match hook {
            Hook::Enqueue => hooks.enqueue(job).await,
            Hook::Before => hooks.before(job).await,
            Hook::Success => hooks.success(job).await,
            Hook::Error(error) => hooks.error(job, error).await,
            Hook::After => hooks.after(job).await,
        }
    }

    /// `before`, `perform`, `success`; `error` on failure; `after` always.
    ///
    /// The first failure among `before`, `perform` and `success` is returned.
    /// A failing `error` hook is logged and does not replace that failure; a
    /// failing `after` hook is only returned when everything else succeeded.
    pub async fn invoke_job(&self, job: &JobRecord) -> Result<(), QueueError> {
        let result = self.run_stages(job).await;

        if let Err(QueueError::Perform(error)) = &result {
            if let Err(hook_err) = self.hook(job, Hook::Error(error)).await {
                warn!(error = %hook_err, "error hook failed");
            }
        }

        match (result, self.hook(job, Hook::After).await) {
            (Ok(()), Err(after_err)) => Err(after_err.into()),
            (Err(e), Err(after_err)) => {
                warn!(error = %after_err, "after hook failed");
                Err(e)
            }
            (result, Ok(())) => result,
        }
    }

    async fn run_stages(&self, job: &JobRecord) -> Result<(), QueueError> {
        self.hook(job, Hook::Before).await?;
        let payload = job.payload_object(&self.codec)?;
        payload.perform().await?;
        self.hook(job, Hook::Success).await?;
        Ok(())
    }
}
