//! When steps for epic lifecycle BDD scenarios.

use super::world::{EpicLifecycleWorld, run_async};
use plansync::planning::{
    domain::{EpicField, EpicStage, EventDraft, EventRole},
    services::ProposeRequest,
};
use rstest_bdd_macros::when;

#[when(r#"the assistant proposes "{field}" as "{content}" targeting "{stage}""#)]
fn assistant_proposes(
    world: &mut EpicLifecycleWorld,
    field: String,
    content: String,
    stage: String,
) -> Result<(), eyre::Report> {
    let epic_field = EpicField::try_from(field.as_str())?;
    let target = EpicStage::try_from(stage.as_str())
        .map_err(|err| eyre::eyre!("invalid stage in scenario: {err}"))?;
    let request = ProposeRequest::new(world.epic()?.id(), epic_field, content, target);
    match run_async(world.service.propose(request)) {
        Ok(proposal) => world.proposal = Some(proposal),
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

#[when("the owner confirms the proposal")]
fn owner_confirms(world: &mut EpicLifecycleWorld) -> Result<(), eyre::Report> {
    let proposal = world
        .proposal
        .take()
        .ok_or_else(|| eyre::eyre!("missing proposal in scenario world"))?;
    let epic = run_async(
        world
            .service
            .confirm(world.epic()?.id(), &proposal.proposal_id),
    )?;
    world.epic = Some(epic);
    Ok(())
}

#[when("the owner rejects the proposal")]
fn owner_rejects(world: &mut EpicLifecycleWorld) -> Result<(), eyre::Report> {
    let proposal = world
        .proposal
        .take()
        .ok_or_else(|| eyre::eyre!("missing proposal in scenario world"))?;
    let epic = run_async(
        world
            .service
            .reject(world.epic()?.id(), &proposal.proposal_id),
    )?;
    world.epic = Some(epic);
    Ok(())
}

#[when(r#"a transcript line "{content}" is appended"#)]
fn transcript_appended(
    world: &mut EpicLifecycleWorld,
    content: String,
) -> Result<(), eyre::Report> {
    let draft = EventDraft::new(EventRole::User, content);
    if let Err(err) = run_async(world.service.append_transcript(world.epic()?.id(), draft)) {
        world.last_error = Some(err);
    }
    Ok(())
}
