//! In-memory integration tests for pushing plans into trackers.

use crate::in_memory::helpers::{Stack, stack};
use plansync::sync::{
    adapters::memory::ProviderCall,
    domain::{FieldMapping, Provider, PushScope, PushStatus},
    ports::ExternalProject,
    services::{PushError, PushRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn changed_field_mapping_updates_every_pushed_issue(
    stack: Stack,
) -> Result<(), eyre::Report> {
    stack.connect(Provider::Jira, Some("PLAN"), None).await?;
    let epic = stack.locked_epic("Checkout revamp").await?;
    stack.approved_feature(&epic, "Guest checkout").await?;
    let request = PushRequest::new(
        stack.owner,
        Provider::Jira,
        epic.id(),
        PushScope::EpicFeatures,
    );
    let first = stack.push.push(&request).await?;

    stack
        .integrations
        .set_field_mapping(
            stack.owner,
            Provider::Jira,
            FieldMapping {
                extra_labels: vec!["web-shop".to_owned()],
                ..FieldMapping::default()
            },
        )
        .await?;
    let second = stack.push.push(&request).await?;

    eyre::ensure!(first.summary.created == 2);
    eyre::ensure!(second.summary.created == 0 && second.summary.updated == 2);
    eyre::ensure!(second.status == PushStatus::Success);
    eyre::ensure!(stack.mappings.len()? == 2);
    let updates = stack
        .jira
        .calls()
        .iter()
        .filter(|call| matches!(call, ProviderCall::Update { .. }))
        .count();
    eyre::ensure!(updates == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linear_issues_are_filed_under_the_default_team(
    stack: Stack,
) -> Result<(), eyre::Report> {
    stack
        .connect(Provider::Linear, Some("ignored-project"), Some("team-web"))
        .await?;
    let epic = stack.locked_epic("Checkout revamp").await?;

    stack
        .push
        .push(&PushRequest::new(
            stack.owner,
            Provider::Linear,
            epic.id(),
            PushScope::EpicOnly,
        ))
        .await?;

    let projects: Vec<String> = stack
        .linear
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProviderCall::Create { project, .. } => Some(project),
            ProviderCall::Update { .. } | ProviderCall::Refresh | ProviderCall::List { .. } => {
                None
            }
        })
        .collect();
    eyre::ensure!(projects == vec!["team-web".to_owned()]);
    eyre::ensure!(stack.jira.calls().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disconnected_tracker_refuses_pushes(stack: Stack) -> Result<(), eyre::Report> {
    stack.connect(Provider::Jira, Some("PLAN"), None).await?;
    let epic = stack.locked_epic("Checkout revamp").await?;
    stack
        .integrations
        .disconnect(stack.owner, Provider::Jira)
        .await?;

    let outcome = stack
        .push
        .push(&PushRequest::new(
            stack.owner,
            Provider::Jira,
            epic.id(),
            PushScope::EpicOnly,
        ))
        .await;

    eyre::ensure!(matches!(
        outcome,
        Err(PushError::IntegrationNotConnected(Provider::Jira))
    ));
    eyre::ensure!(stack.push.list_runs(stack.owner, epic.id()).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn projects_are_listed_with_the_stored_token(stack: Stack) -> Result<(), eyre::Report> {
    stack.connect(Provider::Jira, None, None).await?;
    let project = ExternalProject {
        id: "10000".to_owned(),
        key: Some("PLAN".to_owned()),
        name: "Planning".to_owned(),
    };
    stack.jira.set_projects(vec![project.clone()]);

    let projects = stack
        .integrations
        .list_projects(stack.owner, Provider::Jira)
        .await?;
    let teams = stack
        .integrations
        .list_teams(stack.owner, Provider::Jira)
        .await?;

    eyre::ensure!(projects == vec![project]);
    eyre::ensure!(teams.is_empty());
    Ok(())
}
