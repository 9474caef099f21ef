//! Then steps for epic lifecycle BDD scenarios.

use super::world::{EpicLifecycleWorld, run_async};
use plansync::planning::{
    domain::{EpicField, EpicStage, PlanningDomainError},
    services::LifecycleError,
};
use rstest_bdd_macros::then;

#[then(r#"the epic stage is "{stage}""#)]
fn epic_stage_is(world: &EpicLifecycleWorld, stage: String) -> Result<(), eyre::Report> {
    let expected = EpicStage::try_from(stage.as_str())
        .map_err(|err| eyre::eyre!("invalid stage in scenario: {err}"))?;
    let stored = run_async(world.service.get_epic(world.epic()?.id()))?;

    if stored.stage() != expected {
        return Err(eyre::eyre!(
            "expected stage {expected}, found {}",
            stored.stage()
        ));
    }
    Ok(())
}

#[then(r#"the epic "{field}" reads "{content}""#)]
fn epic_field_reads(
    world: &EpicLifecycleWorld,
    field: String,
    content: String,
) -> Result<(), eyre::Report> {
    let epic_field = EpicField::try_from(field.as_str())?;
    let stored = run_async(world.service.get_epic(world.epic()?.id()))?;

    let actual = stored.content().field(epic_field);
    if actual != Some(content.as_str()) {
        return Err(eyre::eyre!("expected {field} to read {content:?}, found {actual:?}"));
    }
    Ok(())
}

#[then(r#"the epic "{field}" is empty"#)]
fn epic_field_is_empty(world: &EpicLifecycleWorld, field: String) -> Result<(), eyre::Report> {
    let epic_field = EpicField::try_from(field.as_str())?;
    let stored = run_async(world.service.get_epic(world.epic()?.id()))?;

    if let Some(actual) = stored.content().field(epic_field) {
        return Err(eyre::eyre!("expected {field} to be empty, found {actual:?}"));
    }
    Ok(())
}

#[then("the decision log holds {count:u64} entries")]
fn decision_log_holds(world: &EpicLifecycleWorld, count: u64) -> Result<(), eyre::Report> {
    let decisions = run_async(world.service.list_decisions(world.epic()?.id()))?;

    if u64::try_from(decisions.len())? != count {
        return Err(eyre::eyre!(
            "expected {count} decisions, found {}",
            decisions.len()
        ));
    }
    Ok(())
}

#[then("the request fails with a stage violation")]
fn fails_with_stage_violation(world: &EpicLifecycleWorld) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing error in scenario world"))?;

    if !matches!(
        error,
        LifecycleError::Domain(PlanningDomainError::StageViolation { .. })
    ) {
        return Err(eyre::eyre!("expected StageViolation error, got {error:?}"));
    }
    Ok(())
}

#[then("the request fails because the epic is immutable")]
fn fails_because_immutable(world: &EpicLifecycleWorld) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing error in scenario world"))?;

    if !matches!(
        error,
        LifecycleError::Domain(PlanningDomainError::ImmutableEntity { .. })
    ) {
        return Err(eyre::eyre!("expected ImmutableEntity error, got {error:?}"));
    }
    Ok(())
}
