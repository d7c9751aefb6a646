//! Credential pool module
//!
//! Storage, health policy, selection and bookkeeping for provider credentials.

pub mod fallback;
pub mod in_memory;
pub mod model;
pub mod policy;
pub mod recorder;
pub mod redis;
pub mod selector;
pub mod store;

pub use fallback::EnvFallbackResolver;
pub use in_memory::InMemoryCredentialStore;
pub use model::{
    Credential, CredentialStatus, CredentialView, FailureCounters, NewCredential,
    SelectedCredential,
};
pub use policy::{HealthConfig, HealthPolicy};
pub use recorder::HealthRecorder;
pub use self::redis::RedisCredentialStore;
pub use selector::CredentialSelector;
pub use store::{CredentialStore, StoreError, StoreResult};
