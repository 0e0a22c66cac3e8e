//! Typed payload API.
//!
//! Payload types bind to a stored type tag at compile time; the registry is
//! the closed set of tags the codec will instantiate.
//!
//! # Two layers
//! - **Typed**: `PayloadType` (serde + tag), used at enqueue
//! - **Dyn**: `Payload`, `LifecycleHooks` (object-safe), used by workers
//!   through `HookDispatcher`

pub mod codec;
pub mod hooks;
pub mod payload;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use self::codec::{PayloadCodec, UNKNOWN_PAYLOAD, display_name_of, type_tag};
pub use self::hooks::{Hook, HookDispatcher};
pub use self::payload::{LifecycleHooks, Payload, PayloadType};
pub use self::registry::{PayloadRegistry, RegistryError};
