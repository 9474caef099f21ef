//! Port contracts for tracker synchronisation.
//!
//! Storage ports persist mappings, runs, and integrations; the provider
//! port abstracts one tracker's issue API; the transport port abstracts
//! HTTP so that provider adapters can be exercised without a network; the
//! cipher port encrypts credentials at rest.

pub mod cipher;
pub mod integration;
pub mod mapping;
pub mod provider;
pub mod run;
pub mod transport;

pub use cipher::{CipherError, CredentialCipher};
pub use integration::{
    IntegrationRepository, IntegrationRepositoryError, IntegrationRepositoryResult,
};
pub use mapping::{MappingRepository, MappingRepositoryError, MappingRepositoryResult};
pub use provider::{
    CreatedIssue, ErrorClass, ExternalProject, ProviderAdapter, ProviderError, ProviderResult,
};
pub use run::{PushRunRepository, PushRunRepositoryError, PushRunRepositoryResult};
pub use transport::{
    HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
