//! In-memory adapter implementations for testing.
//!
//! The stores are thread-safe and keep the same uniqueness and
//! compare-and-set rules as the `PostgreSQL` adapter. The provider and
//! transport fakes can be scripted to fail specific calls.

mod cipher;
mod provider;
mod stores;
mod transport;

pub use cipher::PlaintextCipher;
pub use provider::{ProviderCall, ScriptedProviderAdapter};
pub use stores::{
    InMemoryIntegrationRepository, InMemoryMappingRepository, InMemoryPushRunRepository,
};
pub use transport::ScriptedTransport;
