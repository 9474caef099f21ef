//! Azure `DevOps` Boards adapter using JSON-Patch work item requests.

use super::http::{OAuthClientConfig, authorised, send_json};
use crate::sync::{
    domain::{AccessToken, CanonicalPayload, Provider, PushPayload, RefreshToken, TokenGrant},
    ports::{
        CreatedIssue, ExternalProject, HttpMethod, HttpTransport, ProviderAdapter, ProviderError,
        ProviderResult,
    },
};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

const API_VERSION: &str = "7.1";
const JSON_PATCH: &str = "application/json-patch+json";
const PARENT_LINK: &str = "System.LinkTypes.Hierarchy-Reverse";

/// Azure `DevOps` organisation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureDevOpsConfig {
    /// Organisation URL, such as `https://dev.azure.com/example`.
    pub organization_url: String,
    /// OAuth client used for token refresh.
    pub oauth: OAuthClientConfig,
}

/// Azure `DevOps` work item adapter.
#[derive(Clone)]
pub struct AzureDevOpsAdapter {
    config: AzureDevOpsConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
struct WorkItem {
    id: u64,
    #[serde(rename = "_links")]
    links: Option<WorkItemLinks>,
}

#[derive(Debug, Deserialize)]
struct WorkItemLinks {
    html: Option<Href>,
}

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    value: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    id: String,
    name: String,
}

impl WorkItem {
    fn html_url(self) -> Option<String> {
        self.links.and_then(|links| links.html).map(|html| html.href)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br/>")
}

fn add_field(field: &str, value: impl Into<Value>) -> Value {
    json!({ "op": "add", "path": format!("/fields/{field}"), "value": value.into() })
}

fn field_operations(content: &CanonicalPayload) -> Vec<Value> {
    let criteria: String = content
        .acceptance_criteria()
        .iter()
        .map(|criterion| format!("<li>{}</li>", escape_html(criterion)))
        .collect();
    vec![
        add_field("System.Title", content.title()),
        add_field(
            "System.Description",
            content.description().map(escape_html).unwrap_or_default(),
        ),
        add_field(
            "Microsoft.VSTS.Common.AcceptanceCriteria",
            if criteria.is_empty() {
                String::new()
            } else {
                format!("<ul>{criteria}</ul>")
            },
        ),
        add_field("System.Tags", content.labels().join("; ")),
    ]
}

impl AzureDevOpsAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(config: AzureDevOpsConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn url(&self, segments: &[&str]) -> ProviderResult<Url> {
        let mut url = Url::parse(&self.config.organization_url).map_err(|err| {
            ProviderError::Unexpected(format!("invalid organisation URL: {err}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ProviderError::Unexpected("organisation URL cannot be a base".to_owned())
            })?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    fn work_item_url(&self, id: &str) -> ProviderResult<String> {
        Ok(self.url(&["_apis", "wit", "workItems", id])?.to_string())
    }
}

#[async_trait]
impl ProviderAdapter for AzureDevOpsAdapter {
    fn provider(&self) -> Provider {
        Provider::AzureDevOps
    }

    async fn create_issue(
        &self,
        token: &AccessToken,
        project: &str,
        payload: &PushPayload,
    ) -> ProviderResult<CreatedIssue> {
        let work_item_type = format!("${}", payload.content.issue_type());
        let url = self.url(&[project, "_apis", "wit", "workitems", &work_item_type])?;
        let mut operations = field_operations(&payload.content);
        if let Some(parent) = &payload.parent {
            operations.push(json!({
                "op": "add",
                "path": "/relations/-",
                "value": { "rel": PARENT_LINK, "url": self.work_item_url(&parent.external_id)? },
            }));
        }
        let request = authorised(HttpMethod::Post, url.to_string(), token)
            .header("Content-Type", JSON_PATCH)
            .json(Value::Array(operations));
        let item: WorkItem = send_json(self.transport.as_ref(), request).await?;
        let id = item.id.to_string();
        Ok(CreatedIssue {
            external_key: Some(format!("#{id}")),
            external_id: id,
            url: item.html_url(),
        })
    }

    async fn update_issue(
        &self,
        token: &AccessToken,
        external_id: &str,
        payload: &PushPayload,
    ) -> ProviderResult<Option<String>> {
        let request = authorised(HttpMethod::Patch, self.work_item_url(external_id)?, token)
            .header("Content-Type", JSON_PATCH)
            .json(Value::Array(field_operations(&payload.content)));
        let item: WorkItem = send_json(self.transport.as_ref(), request).await?;
        Ok(item.html_url())
    }

    async fn list_projects(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        let url = self.url(&["_apis", "projects"])?;
        let request = authorised(HttpMethod::Get, url.to_string(), token);
        let list: ProjectList = send_json(self.transport.as_ref(), request).await?;
        Ok(list
            .value
            .into_iter()
            .map(|entry| ExternalProject {
                id: entry.id,
                key: None,
                name: entry.name,
            })
            .collect())
    }

    async fn refresh_token(&self, refresh_token: &RefreshToken) -> ProviderResult<TokenGrant> {
        self.config
            .oauth
            .refresh(self.transport.as_ref(), refresh_token)
            .await
    }
}
