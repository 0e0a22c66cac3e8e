//! Payload traits: the unit of work and its optional capabilities.
//!
//! # Two layers
//! - **Dyn**: `Payload` is object-safe. Workers hold `Arc<dyn Payload>`
//!   after decoding and never know the concrete type.
//! - **Typed**: `PayloadType` binds a Rust type to the type tag written into
//!   the handler, and adds the serde bounds the codec needs.
//!
//! Optional capabilities are plain methods with a "not provided" default
//! (`None`), and lifecycle hooks sit behind `Payload::hooks`, so a dispatcher
//! checks for a capability instead of probing the type at runtime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{JobRecord, PerformError};

/// A deferred unit of work.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendWelcome { user_id: u64 }
///
/// #[async_trait]
/// impl Payload for SendWelcome {
///     async fn perform(&self) -> Result<(), PerformError> {
///         mailer::welcome(self.user_id).await.map_err(PerformError::from_source)
///     }
/// }
///
/// impl PayloadType for SendWelcome {
///     const TYPE: &'static str = "acme.mailer.send_welcome.v1";
/// }
/// ```
#[async_trait]
pub trait Payload: Send + Sync + 'static {
    /// Primary execution entry point.
    async fn perform(&self) -> Result<(), PerformError>;

    /// Human-readable name used in logs. Defaults to the type name.
    fn display_name(&self) -> Option<String> {
        None
    }

    /// Per-payload ceiling on failed attempts. `None` uses the queue default.
    fn max_attempts(&self) -> Option<u32> {
        None
    }

    /// Custom retry schedule. `None` uses the default backoff.
    fn reschedule_at(&self, _now: DateTime<Utc>, _attempts: u32) -> Option<DateTime<Utc>> {
        None
    }

    /// Lifecycle hooks, if this payload has any.
    fn hooks(&self) -> Option<&dyn LifecycleHooks> {
        None
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Binds a payload type to its stored type tag.
///
/// # Trait Bounds
/// - `Serialize`: to encode into the handler
/// - `DeserializeOwned`: to decode from the handler
pub trait PayloadType: Payload + Serialize + DeserializeOwned + Sized {
    /// Tag written into the handler and looked up in the registry on decode.
    ///
    /// # Naming
    /// - `{namespace}.{domain}.{action}.v{major}`
    /// - e.g. `acme.billing.charge.v1`
    const TYPE: &'static str;
}

/// Callbacks around payload execution. Every hook is a no-op unless overridden.
///
/// Hooks receive the job being run; implementors that do not need it ignore it.
///
/// Order: `enqueue` once at creation (before persistence), then per attempt
/// `before`, `perform`, `success` or `error`, and `after` unconditionally.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn enqueue(&self, _job: &JobRecord) -> Result<(), PerformError> {
        Ok(())
    }

    async fn before(&self, _job: &JobRecord) -> Result<(), PerformError> {
        Ok(())
    }

    async fn success(&self, _job: &JobRecord) -> Result<(), PerformError> {
        Ok(())
    }

    async fn error(&self, _job: &JobRecord, _error: &PerformError) -> Result<(), PerformError> {
        Ok(())
    }

    async fn after(&self, _job: &JobRecord) -> Result<(), PerformError> {
        Ok(())
    }
}
