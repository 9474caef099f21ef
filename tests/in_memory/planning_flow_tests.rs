//! In-memory integration tests for planning artefact lifecycles.

use crate::in_memory::helpers::{Stack, stack};
use plansync::planning::{
    domain::{
        BugLinkType, BugSeverity, ContentPatch, DeletionConfirmation, EntityRef, EpicField,
        EpicStage, EventDraft, EventRole, ItemContent, ItemStage, PlanningDomainError,
        StoryParent,
    },
    services::{LifecycleError, ProposeRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn epic_history_is_removed_with_the_epic(stack: Stack) -> Result<(), eyre::Report> {
    let service = &stack.lifecycle;
    let epic = service.create_epic(stack.owner, "Checkout revamp").await?;
    for line in ["Guests abandon carts", "Login is the blocker"] {
        service
            .append_transcript(epic.id(), EventDraft::new(EventRole::User, line))
            .await?;
    }
    let proposal = service
        .propose(ProposeRequest::new(
            epic.id(),
            EpicField::ProblemStatement,
            "Guests abandon carts at login",
            EpicStage::OutcomeCapture,
        ))
        .await?;
    service.confirm(epic.id(), &proposal.proposal_id).await?;
    let feature = service
        .create_feature(epic.id(), ItemContent::new("Guest checkout")?)
        .await?;
    service
        .append_conversation(
            feature.entity_ref(),
            EventDraft::new(EventRole::Assistant, "Which payment methods?"),
        )
        .await?;
    let story = service
        .create_story(feature.id(), ItemContent::new("Pay by card")?)
        .await?;

    let confirmation =
        DeletionConfirmation::new(epic.entity_ref(), stack.owner, "Duplicate of Q3 epic")?;
    let receipt = service.delete_epic(epic.id(), &confirmation).await?;

    eyre::ensure!(receipt.cascaded_rows == 4, "cascaded {}", receipt.cascaded_rows);
    eyre::ensure!(matches!(
        service.get_story(story.id()).await,
        Err(LifecycleError::NotFound(_))
    ));
    eyre::ensure!(service.list_transcript(epic.id()).await?.is_empty());
    eyre::ensure!(service.list_decisions(epic.id()).await?.is_empty());
    let receipts = service.list_deletion_receipts(stack.owner).await?;
    eyre::ensure!(receipts == vec![receipt]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refinement_edits_stop_at_approval(stack: Stack) -> Result<(), eyre::Report> {
    let service = &stack.lifecycle;
    let epic = service.create_epic(stack.owner, "Checkout revamp").await?;
    let feature = service
        .create_feature(epic.id(), ItemContent::new("Guest checkout")?)
        .await?;
    service.start_feature_refinement(feature.id()).await?;
    let edited = service
        .update_feature(
            feature.id(),
            ContentPatch::new()
                .title("Guest checkout without login")
                .acceptance_criteria(vec!["No account prompt".to_owned()]),
        )
        .await?;
    let approved = service.approve_feature(feature.id()).await?;

    let late_edit = service
        .update_feature(feature.id(), ContentPatch::new().title("Renamed"))
        .await;

    eyre::ensure!(edited.stage() == ItemStage::Refining);
    eyre::ensure!(approved.stage() == ItemStage::Approved);
    eyre::ensure!(approved.approved_at().is_some());
    eyre::ensure!(matches!(
        late_edit,
        Err(LifecycleError::Domain(PlanningDomainError::ImmutableEntity { .. }))
    ));
    let stored = service.get_feature(feature.id()).await?;
    eyre::ensure!(stored.content().title() == "Guest checkout without login");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn standalone_story_and_bug_links_survive_feature_deletion(
    stack: Stack,
) -> Result<(), eyre::Report> {
    let service = &stack.lifecycle;
    let epic = service.create_epic(stack.owner, "Checkout revamp").await?;
    let feature = service
        .create_feature(epic.id(), ItemContent::new("Guest checkout")?)
        .await?;
    let standalone = service
        .create_standalone_story(stack.owner, ItemContent::new("Tidy the footer")?)
        .await?;
    let bug = service
        .create_bug(
            stack.owner,
            BugSeverity::High,
            ItemContent::new("Total ignores vouchers")?,
        )
        .await?;
    service
        .link_bug(bug.id(), feature.entity_ref(), BugLinkType::FoundIn)
        .await?;
    service
        .link_bug(bug.id(), standalone.entity_ref(), BugLinkType::RelatesTo)
        .await?;

    let confirmation =
        DeletionConfirmation::new(feature.entity_ref(), stack.owner, "Scope cut")?;
    service.delete_feature(feature.id(), &confirmation).await?;

    eyre::ensure!(standalone.parent() == StoryParent::Standalone(stack.owner));
    eyre::ensure!(service.get_bug(bug.id()).await.is_ok());
    eyre::ensure!(
        service
            .list_bugs_linked_to(&[feature.entity_ref()])
            .await?
            .is_empty()
    );
    let still_linked = service
        .list_bugs_linked_to(&[standalone.entity_ref()])
        .await?;
    eyre::ensure!(still_linked.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bugs_cannot_link_to_bugs(stack: Stack) -> Result<(), eyre::Report> {
    let service = &stack.lifecycle;
    let first = service
        .create_bug(stack.owner, BugSeverity::Low, ItemContent::new("Typo")?)
        .await?;
    let second = service
        .create_bug(stack.owner, BugSeverity::Low, ItemContent::new("Other typo")?)
        .await?;

    let outcome = service
        .link_bug(first.id(), EntityRef::bug(second.id()), BugLinkType::RelatesTo)
        .await;

    eyre::ensure!(matches!(
        outcome,
        Err(LifecycleError::Domain(PlanningDomainError::InvalidLinkTarget(_)))
    ));
    Ok(())
}
