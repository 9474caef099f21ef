//! Tracker adapters built on the [`HttpTransport`] port.
//!
//! [`HttpTransport`]: crate::sync::ports::HttpTransport

mod azure_devops;
mod http;
mod jira;
mod linear;
mod reqwest_transport;

pub use azure_devops::{AzureDevOpsAdapter, AzureDevOpsConfig};
pub use http::{OAuthClientConfig, error_for_status};
pub use jira::{JiraAdapter, JiraConfig};
pub use linear::{LINEAR_GRAPHQL_URL, LinearAdapter, LinearConfig};
pub use reqwest_transport::ReqwestTransport;
