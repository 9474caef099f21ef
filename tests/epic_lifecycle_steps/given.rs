//! Given steps for epic lifecycle BDD scenarios.

use super::world::{EpicLifecycleWorld, run_async};
use eyre::WrapErr;
use plansync::planning::{
    domain::{EpicField, EpicStage, StageGraph},
    services::ProposeRequest,
};
use rstest_bdd_macros::given;

#[given(r#"an epic titled "{title}""#)]
fn epic_titled(world: &mut EpicLifecycleWorld, title: String) -> Result<(), eyre::Report> {
    let epic = run_async(world.service.create_epic(world.owner, title)).wrap_err("create epic")?;
    world.epic = Some(epic);
    Ok(())
}

#[given(r#"the epic has been walked to "{stage}""#)]
fn epic_walked_to(world: &mut EpicLifecycleWorld, stage: String) -> Result<(), eyre::Report> {
    let target = EpicStage::try_from(stage.as_str())
        .map_err(|err| eyre::eyre!("invalid stage in scenario: {err}"))?;
    let epic_id = world.epic()?.id();
    let mut current = world.epic()?.stage();
    while current != target {
        let next = current
            .next()
            .ok_or_else(|| eyre::eyre!("cannot walk past {current}"))?;
        let field = match next {
            EpicStage::OutcomeCapture => EpicField::ProblemStatement,
            EpicStage::EpicFinal => EpicField::DesiredOutcome,
            EpicStage::ProblemCapture | EpicStage::EpicLocked => EpicField::Summary,
        };
        let request = ProposeRequest::new(epic_id, field, "Agreed text", next);
        let proposal = run_async(world.service.propose(request)).wrap_err("stage proposal")?;
        let epic = run_async(world.service.confirm(epic_id, &proposal.proposal_id))
            .wrap_err("confirm proposal")?;
        current = epic.stage();
        world.epic = Some(epic);
    }
    Ok(())
}
