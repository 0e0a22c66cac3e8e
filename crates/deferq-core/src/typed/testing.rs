//! Payload fixtures shared by unit tests.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::payload::{LifecycleHooks, Payload, PayloadType};
use super::{PayloadCodec, PayloadRegistry};
use crate::domain::{JobRecord, PerformError};

pub(crate) fn test_registry() -> PayloadRegistry {
    let mut registry = PayloadRegistry::new();
    registry.register::<Greeting>().unwrap();
    registry.register::<Named>().unwrap();
    registry.register::<Flaky>().unwrap();
    registry.register::<Hooked>().unwrap();
    registry
}

pub(crate) fn test_codec() -> PayloadCodec {
    PayloadCodec::new(test_registry())
}

/// Always succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Greeting {
    pub name: String,
}

impl Greeting {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Payload for Greeting {
    async fn perform(&self) -> Result<(), PerformError> {
        Ok(())
    }
}

impl PayloadType for Greeting {
    const TYPE: &'static str = "test.greeting.v1";
}

/// Succeeds and provides its own display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Named {
    pub title: String,
}

impl Named {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
        }
    }
}

#[async_trait]
impl Payload for Named {
    async fn perform(&self) -> Result<(), PerformError> {
        Ok(())
    }

    fn display_name(&self) -> Option<String> {
        Some(self.title.clone())
    }
}

impl PayloadType for Named {
    const TYPE: &'static str = "test.named.v1";
}

/// Always fails. Optionally declares its own attempt ceiling and retry delay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Flaky {
    pub max_attempts: Option<u32>,
    pub retry_in_secs: Option<i64>,
}

#[async_trait]
impl Payload for Flaky {
    async fn perform(&self) -> Result<(), PerformError> {
        Err(PerformError::new("flaky failure"))
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    fn reschedule_at(&self, now: DateTime<Utc>, _attempts: u32) -> Option<DateTime<Utc>> {
        self.retry_in_secs.map(|secs| now + Duration::seconds(secs))
    }
}

impl PayloadType for Flaky {
    const TYPE: &'static str = "test.flaky.v1";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Stage {
    Before,
    Perform,
    Success,
    After,
}

static HOOK_LOG: LazyLock<Mutex<HashMap<String, Vec<String>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn record(label: &str, event: impl Into<String>) {
    HOOK_LOG
        .lock()
        .unwrap()
        .entry(label.to_string())
        .or_default()
        .push(event.into());
}

/// Events recorded by `Hooked` payloads carrying `label`, in order.
pub(crate) fn hook_log(label: &str) -> Vec<String> {
    HOOK_LOG
        .lock()
        .unwrap()
        .get(label)
        .cloned()
        .unwrap_or_default()
}

/// Records every hook call into a process-wide log keyed by `label`, so the
/// calls stay observable after the payload went through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Hooked {
    pub label: String,
    pub fail_in: Option<Stage>,
    #[serde(default)]
    pub error_hook_fails: bool,
}

impl Hooked {
    pub fn new() -> Self {
        Self {
            label: Ulid::new().to_string(),
            fail_in: None,
            error_hook_fails: false,
        }
    }

    pub fn failing_in(stage: Stage) -> Self {
        Self {
            fail_in: Some(stage),
            ..Self::new()
        }
    }

    pub fn with_failing_error_hook(self) -> Self {
        Self {
            error_hook_fails: true,
            ..self
        }
    }

    pub fn log(&self) -> Vec<String> {
        hook_log(&self.label)
    }

    fn step(&self, stage: Stage, event: &str) -> Result<(), PerformError> {
        record(&self.label, event);
        if self.fail_in == Some(stage) {
            return Err(PerformError::new(format!("{event} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Payload for Hooked {
    async fn perform(&self) -> Result<(), PerformError> {
        self.step(Stage::Perform, "perform")
    }

    fn hooks(&self) -> Option<&dyn LifecycleHooks> {
        Some(self)
    }
}

#[async_trait]
impl LifecycleHooks for Hooked {
    async fn enqueue(&self, _job: &JobRecord) -> Result<(), PerformError> {
        record(&self.label, "enqueue");
        Ok(())
    }

    async fn before(&self, _job: &JobRecord) -> Result<(), PerformError> {
        self.step(Stage::Before, "before")
    }

    async fn success(&self, _job: &JobRecord) -> Result<(), PerformError> {
        self.step(Stage::Success, "success")
    }

    async fn error(&self, _job: &JobRecord, error: &PerformError) -> Result<(), PerformError> {
        record(&self.label, format!("error: {error}"));
        if self.error_hook_fails {
            return Err(PerformError::new("error hook failed"));
        }
        Ok(())
    }

    async fn after(&self, _job: &JobRecord) -> Result<(), PerformError> {
        self.step(Stage::After, "after")
    }
}

impl PayloadType for Hooked {
    const TYPE: &'static str = "test.hooked.v1";
}
