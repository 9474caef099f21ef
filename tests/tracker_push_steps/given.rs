//! Given steps for tracker push BDD scenarios.

use super::world::{TrackerPushWorld, run_async};
use eyre::WrapErr;
use plansync::{
    planning::{
        domain::{EpicField, EpicStage, ItemContent},
        services::ProposeRequest,
    },
    sync::{
        domain::{AccessToken, Provider, PushScope},
        ports::ProviderError,
        services::ConnectRequest,
    },
};
use rstest_bdd_macros::given;

#[given(r#"a user connected to "{provider}" with default project "{project}""#)]
fn user_connected(
    world: &mut TrackerPushWorld,
    provider: String,
    project: String,
) -> Result<(), eyre::Report> {
    world.provider = Provider::try_from(provider.as_str())?;
    let request = ConnectRequest {
        access_token: AccessToken::new("scenario-token"),
        refresh_token: None,
        expires_at: None,
    };
    run_async(world.integrations.connect(world.owner, world.provider, request))
        .wrap_err("connect integration")?;
    run_async(
        world
            .integrations
            .set_defaults(world.owner, world.provider, Some(project), None),
    )
    .wrap_err("set integration defaults")?;
    Ok(())
}

#[given(r#"a locked epic titled "{title}""#)]
fn locked_epic(world: &mut TrackerPushWorld, title: String) -> Result<(), eyre::Report> {
    let epic = run_async(world.lifecycle.create_epic(world.owner, title)).wrap_err("create epic")?;
    let steps = [
        (EpicField::ProblemStatement, EpicStage::OutcomeCapture),
        (EpicField::DesiredOutcome, EpicStage::EpicFinal),
        (EpicField::Summary, EpicStage::EpicLocked),
    ];
    for (field, target) in steps {
        let request = ProposeRequest::new(epic.id(), field, "Agreed text", target);
        let proposal = run_async(world.lifecycle.propose(request)).wrap_err("stage proposal")?;
        run_async(world.lifecycle.confirm(epic.id(), &proposal.proposal_id))
            .wrap_err("confirm proposal")?;
    }
    world.epic = Some(run_async(world.lifecycle.get_epic(epic.id()))?);
    Ok(())
}

#[given(r#"an approved feature titled "{title}""#)]
fn approved_feature(world: &mut TrackerPushWorld, title: String) -> Result<(), eyre::Report> {
    let epic_id = world.request(PushScope::EpicOnly)?.epic_id;
    let feature = run_async(
        world
            .lifecycle
            .create_feature(epic_id, ItemContent::new(title)?),
    )?;
    run_async(world.lifecycle.start_feature_refinement(feature.id()))?;
    run_async(world.lifecycle.approve_feature(feature.id()))?;
    Ok(())
}

#[given(r#"a draft feature titled "{title}""#)]
fn draft_feature(world: &mut TrackerPushWorld, title: String) -> Result<(), eyre::Report> {
    let epic_id = world.request(PushScope::EpicOnly)?.epic_id;
    run_async(
        world
            .lifecycle
            .create_feature(epic_id, ItemContent::new(title)?),
    )?;
    Ok(())
}

#[given("the epic has been pushed with its features")]
fn epic_pushed(world: &mut TrackerPushWorld) -> Result<(), eyre::Report> {
    let request = world.request(PushScope::EpicFeatures)?;
    run_async(world.push.push(&request)).wrap_err("initial push")?;
    Ok(())
}

#[given(r#"the tracker rejects issues titled "{title}""#)]
fn tracker_rejects(world: &mut TrackerPushWorld, title: String) {
    world.adapter.fail_always(
        &title,
        ProviderError::Validation {
            status: 400,
            message: "issue type is not valid for this project".to_owned(),
        },
    );
}
