//! Adapters for the sync module.
//!
//! - [`cipher`]: `ChaCha20-Poly1305` encryption of stored credentials
//! - [`memory`]: in-memory stores, a plaintext cipher, and scripted
//!   provider and transport fakes for tests and local runs
//! - [`postgres`]: `PostgreSQL` persistence for mappings, runs, and
//!   integrations
//! - [`providers`]: Jira, Linear, and Azure `DevOps` adapters over an HTTP
//!   transport, plus a `reqwest`-backed transport

pub mod cipher;
pub mod memory;
pub mod postgres;
pub mod providers;
