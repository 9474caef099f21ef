//! Push orchestration scenarios over the in-memory stores.

use std::collections::HashMap;

use super::support::Harness;
use crate::planning::domain::{BugLinkType, BugSeverity, EntityRef, EpicId, ItemContent};
use crate::sync::{
    adapters::memory::{PlaintextCipher, ProviderCall},
    domain::{
        AccessToken, ConnectionStatus, ContentHash, ErrorCategory, ExternalPushMapping,
        MappingKey, Provider, PushAction, PushRun, PushScope, PushStatus, RefreshToken,
        SkipReason, TokenGrant,
    },
    ports::{
        CredentialCipher, IntegrationRepository, MappingRepository, ProviderError,
        PushRunRepository,
    },
    services::{ConnectRequest, PushError},
};
use chrono::{Duration, Utc};
use eyre::{Result, ensure, eyre};
use rstest::{fixture, rstest};

#[fixture]
fn harness() -> Harness {
    Harness::new(Provider::Jira)
}

/// Maps every entity of a finished real run to the action it received.
fn actions_taken(run: &PushRun) -> HashMap<EntityRef, PushAction> {
    let mut actions = HashMap::new();
    for item in &run.created {
        actions.insert(item.entity, PushAction::Create);
    }
    for item in &run.updated {
        actions.insert(item.entity, PushAction::Update);
    }
    for item in &run.skipped {
        actions.insert(item.entity, PushAction::Skip);
    }
    actions
}

fn created_titles(calls: &[ProviderCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            ProviderCall::Create { title, .. } => Some(title.clone()),
            ProviderCall::Update { .. } | ProviderCall::Refresh | ProviderCall::List { .. } => None,
        })
        .collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn mapped_feature_is_skipped_and_new_feature_created(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    let mapped = harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    let request = harness.request(epic.id(), PushScope::EpicFeatures);
    harness.service.push(&request).await?;

    let fresh = harness.approved_feature(epic.id(), "Saved cards").await?;
    let run = harness.service.push(&request).await?;

    ensure!(run.status == PushStatus::Success);
    ensure!(run.created.len() == 1);
    ensure!(run.created.first().map(|item| item.entity) == Some(fresh.entity_ref()));
    // The unchanged epic is skipped alongside the mapped feature.
    let skipped: Vec<_> = run
        .skipped
        .iter()
        .map(|item| (item.entity, item.reason))
        .collect();
    ensure!(
        skipped
            == vec![
                (epic.entity_ref(), SkipReason::Unchanged),
                (mapped.entity_ref(), SkipReason::Unchanged),
            ],
        "skipped {skipped:?}"
    );
    ensure!(run.summary.created == 1 && run.summary.skipped == 2);
    ensure!(run.updated.is_empty() && run.failed.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pushing_unchanged_entities_twice_keeps_one_mapping_each(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness.approved_feature(epic.id(), "Guest checkout").await?;
    let request = harness.request(epic.id(), PushScope::EpicFeatures);

    let first = harness.service.push(&request).await?;
    let second = harness.service.push(&request).await?;

    ensure!(first.created.len() == 2);
    ensure!(second.created.is_empty() && second.updated.is_empty());
    ensure!(second.skipped.len() == 2);
    ensure!(
        second
            .skipped
            .iter()
            .all(|item| item.reason == SkipReason::Unchanged)
    );
    ensure!(harness.mappings.len()? == 2);
    ensure!(harness.adapter.write_count() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn preview_classifies_exactly_as_the_following_push(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    let request = harness.request(epic.id(), PushScope::EpicFeatures);
    harness.service.push(&request).await?;

    let stale = harness.approved_feature(epic.id(), "Saved cards").await?;
    let draft = harness.draft_feature(epic.id(), "Wallet support").await?;
    let stale_mapping = ExternalPushMapping {
        key: MappingKey::new(harness.user, Provider::Jira, stale.entity_ref()),
        external_id: "jira-99".to_owned(),
        external_key: Some("PLAN-99".to_owned()),
        external_url: None,
        last_pushed_at: Utc::now(),
        last_push_hash: ContentHash::new("stale"),
    };
    harness.mappings.upsert_if(&stale_mapping, None).await?;

    let preview = harness.service.preview(&request).await?;
    let pushed = harness.service.push(&request).await?;

    let predicted: HashMap<EntityRef, PushAction> = preview
        .preview
        .iter()
        .map(|item| (item.entity, item.action))
        .collect();
    ensure!(predicted == actions_taken(&pushed));
    ensure!(predicted.get(&stale.entity_ref()) == Some(&PushAction::Update));
    ensure!(predicted.get(&draft.entity_ref()) == Some(&PushAction::Skip));
    ensure!(preview.summary.updated == 1 && preview.summary.created == 0);
    ensure!(harness.adapter.calls().contains(&ProviderCall::Update {
        external_id: "jira-99".to_owned(),
        title: "Saved cards".to_owned(),
        token: "token".to_owned(),
    }));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn preview_has_no_side_effects(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    let draft = harness.draft_feature(epic.id(), "Guest checkout").await?;

    let preview = harness
        .service
        .preview(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(preview.is_dry_run && preview.is_finished());
    ensure!(preview.preview.len() == 2);
    ensure!(preview.skipped.len() == 1);
    ensure!(preview.skipped.iter().all(|item| {
        item.entity == draft.entity_ref() && item.reason == SkipReason::NotApproved
    }));
    ensure!(preview.created.is_empty() && preview.failed.is_empty());
    ensure!(harness.adapter.calls().is_empty());
    ensure!(harness.mappings.is_empty()?);
    ensure!(harness.runs.list_runs(harness.user, epic.id()).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminal_failure_is_isolated_to_its_entity(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    for title in ["Guest checkout", "Saved cards", "Wallet support"] {
        harness.approved_feature(epic.id(), title).await?;
    }
    harness.adapter.fail_always(
        "Saved cards",
        ProviderError::Validation {
            status: 400,
            message: "customfield_10011 is required".to_owned(),
        },
    );

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(run.status == PushStatus::Partial);
    ensure!(run.failed.len() == 1);
    ensure!(run.created.len() == 3);
    ensure!(
        created_titles(&harness.adapter.calls())
            == ["Checkout revamp", "Guest checkout", "Saved cards", "Wallet support"]
                .map(str::to_owned)
    );
    let failed = run.failed.first().ok_or_else(|| eyre!("missing failure"))?;
    ensure!(failed.category == ErrorCategory::Validation);
    ensure!(failed.attempts == 1 && !failed.retried);
    ensure!(failed.detail.is_none());
    ensure!(!failed.message.contains("customfield_10011"));
    ensure!(failed.message.contains("Saved cards"));

    let stored = harness
        .runs
        .find(run.id)
        .await?
        .ok_or_else(|| eyre!("run not stored"))?;
    let detail = stored
        .failed
        .first()
        .and_then(|item| item.detail.clone())
        .unwrap_or_default();
    ensure!(detail.contains("customfield_10011"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_failure_yields_failed_status(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness.adapter.fail_always(
        "Checkout revamp",
        ProviderError::Permission("no create permission".to_owned()),
    );

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicOnly))
        .await?;

    ensure!(run.status == PushStatus::Failed);
    ensure!(run.failed.first().map(|item| item.category) == Some(ErrorCategory::Permission));
    ensure!(harness.mappings.is_empty()?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retryable_errors_are_retried_until_success(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness.adapter.fail_next(
        "Checkout revamp",
        [
            ProviderError::RateLimited("slow down".to_owned()),
            ProviderError::Timeout("read timed out".to_owned()),
        ],
    );

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicOnly))
        .await?;

    ensure!(run.status == PushStatus::Success);
    ensure!(run.created.len() == 1);
    ensure!(harness.adapter.write_count() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_are_recorded_as_retried(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness.adapter.fail_next(
        "Checkout revamp",
        std::iter::repeat_n(ProviderError::RateLimited("slow down".to_owned()), 3),
    );

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicOnly))
        .await?;

    let failed = run.failed.first().ok_or_else(|| eyre!("missing failure"))?;
    ensure!(failed.category == ErrorCategory::RateLimit);
    ensure!(failed.retried && failed.attempts == 3);
    ensure!(harness.adapter.write_count() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn parents_are_linked_to_issues_created_earlier_in_the_run(
    harness: Harness,
) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    let feature = harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    harness
        .approved_story(feature.id(), "Pay without an account")
        .await?;

    harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeaturesStories))
        .await?;

    let parents: Vec<Option<String>> = harness
        .adapter
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProviderCall::Create { parent, project, .. } if project == "PLAN" => Some(parent),
            ProviderCall::Create { .. }
            | ProviderCall::Update { .. }
            | ProviderCall::Refresh
            | ProviderCall::List { .. } => None,
        })
        .collect();
    ensure!(
        parents
            == vec![
                None,
                Some("jira-1".to_owned()),
                Some("jira-2".to_owned())
            ]
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unlocked_epic_is_skipped_but_features_are_pushed(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.epic("Checkout revamp").await?;
    let feature = harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(run.skipped.iter().any(|item| {
        item.entity == epic.entity_ref() && item.reason == SkipReason::NotApproved
    }));
    ensure!(run.created.first().map(|item| item.entity) == Some(feature.entity_ref()));
    ensure!(run.status == PushStatus::Success);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linked_bugs_follow_the_hierarchy(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    let feature = harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    let lifecycle = &harness.lifecycle;
    let linked = lifecycle
        .create_bug(harness.user, BugSeverity::High, ItemContent::new("Total is wrong")?)
        .await?;
    lifecycle.start_bug_refinement(linked.id()).await?;
    lifecycle.approve_bug(linked.id()).await?;
    lifecycle
        .link_bug(linked.id(), feature.entity_ref(), BugLinkType::FoundIn)
        .await?;
    let draft = lifecycle
        .create_bug(harness.user, BugSeverity::Low, ItemContent::new("Typo on button")?)
        .await?;
    lifecycle
        .link_bug(draft.id(), epic.entity_ref(), BugLinkType::RelatesTo)
        .await?;
    lifecycle
        .create_bug(harness.user, BugSeverity::Low, ItemContent::new("Unrelated")?)
        .await?;

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures).with_bugs())
        .await?;

    ensure!(
        created_titles(&harness.adapter.calls())
            == vec![
                "Checkout revamp".to_owned(),
                "Guest checkout".to_owned(),
                "Total is wrong".to_owned()
            ]
    );
    ensure!(run.include_bugs);
    ensure!(run.skipped.iter().any(|item| {
        item.entity == draft.entity_ref() && item.reason == SkipReason::NotApproved
    }));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_token_is_refreshed_once_and_the_call_repeated(harness: Harness) -> Result<()> {
    harness.connect("stale", Some("refresh-1"), None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    harness.adapter.expire_token("stale");
    harness.adapter.set_refresh(Ok(TokenGrant {
        access_token: AccessToken::new("fresh"),
        refresh_token: None,
        expires_in: Some(3_600),
    }));

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(run.status == PushStatus::Success);
    let calls = harness.adapter.calls();
    ensure!(calls.iter().filter(|call| **call == ProviderCall::Refresh).count() == 1);
    ensure!(calls.iter().any(|call| matches!(
        call,
        ProviderCall::Create { title, token, .. } if title == "Guest checkout" && token == "fresh"
    )));

    let stored = harness
        .integrations
        .find(harness.user, Provider::Jira)
        .await?
        .ok_or_else(|| eyre!("integration missing"))?;
    let credentials = stored.connected_credentials()?;
    let cipher = PlaintextCipher::new();
    ensure!(cipher.decrypt(credentials.access_token())? == "fresh");
    let refresh = credentials
        .refresh_token()
        .ok_or_else(|| eyre!("refresh token dropped"))?;
    ensure!(cipher.decrypt(refresh)? == "refresh-1");
    ensure!(credentials.expires_at().is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_refresh_marks_integration_errored(harness: Harness) -> Result<()> {
    harness.connect("stale", Some("revoked"), None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    harness.adapter.expire_token("stale");
    harness
        .adapter
        .set_refresh(Err(ProviderError::Auth("invalid_grant".to_owned())));
    let request = harness.request(epic.id(), PushScope::EpicFeatures);

    let run = harness.service.push(&request).await?;

    ensure!(run.status == PushStatus::Failed);
    ensure!(run.failed.len() == 2);
    ensure!(run.failed.iter().all(|item| item.category == ErrorCategory::Auth));
    ensure!(
        harness
            .adapter
            .calls()
            .iter()
            .filter(|call| **call == ProviderCall::Refresh)
            .count()
            == 1
    );
    let stored = harness
        .integrations
        .find(harness.user, Provider::Jira)
        .await?
        .ok_or_else(|| eyre!("integration missing"))?;
    ensure!(stored.status() == ConnectionStatus::Errored);

    let retry = harness.service.push(&request).await;
    ensure!(matches!(
        retry,
        Err(PushError::IntegrationNotConnected(Provider::Jira))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn token_near_expiry_is_refreshed_before_the_first_call(harness: Harness) -> Result<()> {
    let expires_at = Utc::now() + Duration::seconds(10);
    harness
        .connect("expiring", Some("refresh-1"), Some(expires_at))
        .await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness.adapter.set_refresh(Ok(TokenGrant {
        access_token: AccessToken::new("fresh"),
        refresh_token: Some(RefreshToken::new("refresh-2")),
        expires_in: Some(3_600),
    }));

    harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicOnly))
        .await?;

    let calls = harness.adapter.calls();
    ensure!(calls.first() == Some(&ProviderCall::Refresh));
    ensure!(matches!(
        calls.get(1),
        Some(ProviderCall::Create { token, .. }) if token == "fresh"
    ));
    Ok(())
}

#[rstest]
#[case::still_valid(30, ConnectionStatus::Connected)]
#[case::already_expired(-30, ConnectionStatus::Errored)]
#[tokio::test(flavor = "multi_thread")]
async fn proactive_refresh_without_refresh_token_revokes_only_expired_tokens(
    harness: Harness,
    #[case] expires_in_secs: i64,
    #[case] status_after: ConnectionStatus,
) -> Result<()> {
    let expires_at = Utc::now() + Duration::seconds(expires_in_secs);
    harness.connect("token", None, Some(expires_at)).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    let request = harness.request(epic.id(), PushScope::EpicOnly);

    let run = harness.service.push(&request).await?;

    ensure!(run.status == PushStatus::Success);
    ensure!(!harness.adapter.calls().contains(&ProviderCall::Refresh));
    let stored = harness
        .integrations
        .find(harness.user, Provider::Jira)
        .await?
        .ok_or_else(|| eyre!("integration missing"))?;
    ensure!(stored.status() == status_after, "status {:?}", stored.status());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn token_that_cannot_be_refreshed_keeps_pushing_until_it_expires(
    harness: Harness,
) -> Result<()> {
    let expires_at = Utc::now() + Duration::seconds(30);
    harness.connect("token", None, Some(expires_at)).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    let request = harness.request(epic.id(), PushScope::EpicOnly);

    let first = harness.service.push(&request).await?;
    let second = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(first.status == PushStatus::Success);
    ensure!(second.status == PushStatus::Success);
    ensure!(second.created.len() == 1 && second.skipped.len() == 1);
    let stored = harness
        .integrations
        .find(harness.user, Provider::Jira)
        .await?
        .ok_or_else(|| eyre!("integration missing"))?;
    ensure!(stored.status() == ConnectionStatus::Connected);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refreshed_token_is_used_for_the_run_when_it_cannot_be_stored(
    harness: Harness,
) -> Result<()> {
    harness.connect("stale", Some("refresh-1"), None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    harness.adapter.expire_token("stale");
    harness.adapter.set_refresh(Ok(TokenGrant {
        access_token: AccessToken::new("fresh"),
        refresh_token: None,
        expires_in: Some(3_600),
    }));
    harness.integrations.reject_writes();

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(run.status == PushStatus::Success, "status {}", run.status);
    ensure!(run.created.len() == 2);
    let calls = harness.adapter.calls();
    ensure!(calls.iter().filter(|call| **call == ProviderCall::Refresh).count() == 1);
    let fresh_creates = calls
        .iter()
        .filter(|call| matches!(call, ProviderCall::Create { token, .. } if token == "fresh"))
        .count();
    ensure!(fresh_creates == 2);
    let stored = harness
        .integrations
        .find(harness.user, Provider::Jira)
        .await?
        .ok_or_else(|| eyre!("integration missing"))?;
    ensure!(stored.status() == ConnectionStatus::Connected);
    let cipher = PlaintextCipher::new();
    ensure!(cipher.decrypt(stored.connected_credentials()?.access_token())? == "stale");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lost_mapping_race_is_recorded_as_unknown_failure(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    let feature = harness
        .approved_feature(epic.id(), "Guest checkout")
        .await?;
    harness.mappings.contest(feature.entity_ref())?;

    let run = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicFeatures))
        .await?;

    ensure!(run.status == PushStatus::Partial);
    let failed = run.failed.first().ok_or_else(|| eyre!("missing failure"))?;
    ensure!(failed.entity == feature.entity_ref());
    ensure!(failed.category == ErrorCategory::Unknown);
    ensure!(harness.mappings.len()? == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn push_without_integration_creates_no_run(harness: Harness) -> Result<()> {
    let epic = harness.locked_epic("Checkout revamp").await?;

    let result = harness
        .service
        .push(&harness.request(epic.id(), PushScope::EpicOnly))
        .await;

    ensure!(matches!(
        result,
        Err(PushError::IntegrationNotConnected(Provider::Jira))
    ));
    ensure!(harness.runs.list_runs(harness.user, epic.id()).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn push_without_default_project_is_rejected(harness: Harness) -> Result<()> {
    harness
        .integration_service
        .connect(
            harness.user,
            Provider::Jira,
            ConnectRequest {
                access_token: AccessToken::new("token"),
                refresh_token: None,
                expires_at: None,
            },
        )
        .await?;
    let epic = harness.locked_epic("Checkout revamp").await?;

    let result = harness
        .service
        .preview(&harness.request(epic.id(), PushScope::EpicOnly))
        .await;

    ensure!(matches!(
        result,
        Err(PushError::MissingDefaultProject(Provider::Jira))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn push_of_unknown_epic_is_rejected(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let missing = EpicId::new();

    let result = harness
        .service
        .push(&harness.request(missing, PushScope::EpicOnly))
        .await;

    ensure!(matches!(result, Err(PushError::EpicNotFound(id)) if id == missing));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runs_are_listed_newest_first_and_redacted(harness: Harness) -> Result<()> {
    harness.connect("token", None, None).await?;
    let epic = harness.locked_epic("Checkout revamp").await?;
    harness.adapter.fail_always(
        "Checkout revamp",
        ProviderError::Server {
            status: 500,
            message: "NullPointerException".to_owned(),
        },
    );
    let request = harness.request(epic.id(), PushScope::EpicOnly);
    let first = harness.service.push(&request).await?;
    let second = harness.service.push(&request).await?;

    let runs = harness.service.list_runs(harness.user, epic.id()).await?;
    let fetched = harness.service.get_run(first.id).await?;

    ensure!(runs.iter().map(|run| run.id).collect::<Vec<_>>() == vec![second.id, first.id]);
    ensure!(
        runs.iter()
            .flat_map(|run| run.failed.iter())
            .all(|item| item.detail.is_none())
    );
    ensure!(fetched == first);
    Ok(())
}
