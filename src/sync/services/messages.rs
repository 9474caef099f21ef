//! User-facing failure messages.
//!
//! Each [`ErrorCategory`] owns a `minijinja` template rendered with the
//! tracker name, the entity kind, and the entity title. Failed lookups such
//! as project listings have a separate template set keyed by what was being
//! listed. Raw provider text is never part of the context.

use crate::planning::domain::EntityKind;
use crate::sync::domain::{ErrorCategory, Provider};
use minijinja::{Environment, Value, context};
use std::collections::HashMap;
use tracing::warn;

const AUTH: &str = "{{ provider }} rejected the stored credentials. Reconnect the \
{{ provider }} integration and push again.";
const PERMISSION: &str = "Your {{ provider }} account may not create or edit the {{ kind }} \
\"{{ title }}\" in the target project.";
const VALIDATION: &str = "{{ provider }} rejected the {{ kind }} \"{{ title }}\". Check the \
issue types and field mapping of the integration.";
const RATE_LIMIT: &str = "{{ provider }} is throttling requests, so the {{ kind }} \
\"{{ title }}\" was not pushed. Try again in a few minutes.";
const SERVER: &str = "{{ provider }} could not process the {{ kind }} \"{{ title }}\" right \
now. Try again later.";
const UNKNOWN: &str = "The {{ kind }} \"{{ title }}\" could not be pushed to {{ provider }}.";

const LOOKUP_AUTH: &str = "{{ provider }} rejected the stored credentials. Reconnect the \
{{ provider }} integration to list {{ listing }}.";
const LOOKUP_PERMISSION: &str = "Your {{ provider }} account may not list {{ listing }}.";
const LOOKUP_VALIDATION: &str = "{{ provider }} rejected the request to list {{ listing }}.";
const LOOKUP_RATE_LIMIT: &str = "{{ provider }} is throttling requests. Try listing \
{{ listing }} again in a few minutes.";
const LOOKUP_SERVER: &str = "{{ provider }} could not list {{ listing }} right now. Try again \
later.";
const LOOKUP_UNKNOWN: &str = "The {{ listing }} could not be loaded from {{ provider }}.";

/// Fallback used when a template fails to render.
const FALLBACK: &str = "The item could not be pushed.";
const LOOKUP_FALLBACK: &str = "The tracker request failed.";

/// Template set mapping error categories to messages.
#[derive(Debug, Clone, Default)]
pub struct FailureMessages {
    overrides: HashMap<ErrorCategory, String>,
    lookup_overrides: HashMap<ErrorCategory, String>,
}

impl FailureMessages {
    /// Creates the default template set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the template of `category`.
    #[must_use]
    pub fn with_template(mut self, category: ErrorCategory, template: impl Into<String>) -> Self {
        self.overrides.insert(category, template.into());
        self
    }

    /// Replaces the lookup template of `category`.
    #[must_use]
    pub fn with_lookup_template(
        mut self,
        category: ErrorCategory,
        template: impl Into<String>,
    ) -> Self {
        self.lookup_overrides.insert(category, template.into());
        self
    }

    /// Renders the message for a failed entity.
    #[must_use]
    pub fn render(
        &self,
        category: ErrorCategory,
        provider: Provider,
        kind: EntityKind,
        title: &str,
    ) -> String {
        let template = self
            .overrides
            .get(&category)
            .map_or_else(|| default_template(category), String::as_str);
        let values = context! {
            provider => provider.display_name(),
            kind => kind.as_str(),
            title => title,
        };
        render_or(template, values, category, FALLBACK)
    }

    /// Renders the message for a failed lookup of `listing`, such as
    /// `"projects"`.
    #[must_use]
    pub fn render_lookup(
        &self,
        category: ErrorCategory,
        provider: Provider,
        listing: &str,
    ) -> String {
        let template = self
            .lookup_overrides
            .get(&category)
            .map_or_else(|| lookup_template(category), String::as_str);
        let values = context! {
            provider => provider.display_name(),
            listing => listing,
        };
        render_or(template, values, category, LOOKUP_FALLBACK)
    }
}

fn render_or(
    template: &str,
    values: Value,
    category: ErrorCategory,
    fallback: &str,
) -> String {
    Environment::new()
        .render_str(template, values)
        .unwrap_or_else(|err| {
            warn!(category = category.as_str(), error = %err, "failure message template invalid");
            fallback.to_owned()
        })
}

const fn default_template(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Auth => AUTH,
        ErrorCategory::Permission => PERMISSION,
        ErrorCategory::Validation => VALIDATION,
        ErrorCategory::RateLimit => RATE_LIMIT,
        ErrorCategory::Server => SERVER,
        ErrorCategory::Unknown => UNKNOWN,
    }
}

const fn lookup_template(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Auth => LOOKUP_AUTH,
        ErrorCategory::Permission => LOOKUP_PERMISSION,
        ErrorCategory::Validation => LOOKUP_VALIDATION,
        ErrorCategory::RateLimit => LOOKUP_RATE_LIMIT,
        ErrorCategory::Server => LOOKUP_SERVER,
        ErrorCategory::Unknown => LOOKUP_UNKNOWN,
    }
}
