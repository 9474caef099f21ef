//! When steps for tracker push BDD scenarios.

use super::world::{TrackerPushWorld, run_async};
use eyre::WrapErr;
use plansync::sync::domain::PushScope;
use rstest_bdd_macros::when;

#[when("the user pushes the epic with its features")]
fn user_pushes(world: &mut TrackerPushWorld) -> Result<(), eyre::Report> {
    let request = world.request(PushScope::EpicFeatures)?;
    let run = run_async(world.push.push(&request)).wrap_err("push epic")?;
    world.last_run = Some(run);
    Ok(())
}

#[when("the user previews the epic with its features")]
fn user_previews(world: &mut TrackerPushWorld) -> Result<(), eyre::Report> {
    let request = world.request(PushScope::EpicFeatures)?;
    let run = run_async(world.push.preview(&request)).wrap_err("preview epic")?;
    world.last_run = Some(run);
    Ok(())
}
