//! Then steps for tracker push BDD scenarios.

use super::world::TrackerPushWorld;
use plansync::sync::domain::{ErrorCategory, PushStatus};
use rstest_bdd_macros::then;

#[then(r#"the run status is "{status}""#)]
fn run_status_is(world: &TrackerPushWorld, status: String) -> Result<(), eyre::Report> {
    let expected = PushStatus::try_from(status.as_str())?;
    let run = world.run()?;

    if run.status != expected {
        return Err(eyre::eyre!(
            "expected status {}, found {}",
            expected.as_str(),
            run.status.as_str()
        ));
    }
    Ok(())
}

#[then("{count:u64} issues were created")]
fn issues_created(world: &TrackerPushWorld, count: u64) -> Result<(), eyre::Report> {
    let created = world.run()?.created.len();

    if u64::try_from(created)? != count {
        return Err(eyre::eyre!("expected {count} created issues, found {created}"));
    }
    Ok(())
}

#[then("{count:u64} issues were skipped")]
fn issues_skipped(world: &TrackerPushWorld, count: u64) -> Result<(), eyre::Report> {
    let skipped = world.run()?.skipped.len();

    if u64::try_from(skipped)? != count {
        return Err(eyre::eyre!("expected {count} skipped issues, found {skipped}"));
    }
    Ok(())
}

#[then("{count:u64} issues are predicted for creation")]
fn issues_predicted(world: &TrackerPushWorld, count: u64) -> Result<(), eyre::Report> {
    let run = world.run()?;
    if !run.is_dry_run {
        return Err(eyre::eyre!("expected a dry run"));
    }
    let predicted = run.summary.created;

    if u64::try_from(predicted)? != count {
        return Err(eyre::eyre!("expected {count} predicted creates, found {predicted}"));
    }
    Ok(())
}

#[then("the tracker received no calls")]
fn tracker_untouched(world: &TrackerPushWorld) -> Result<(), eyre::Report> {
    let calls = world.adapter.calls();

    if !calls.is_empty() {
        return Err(eyre::eyre!("expected no tracker calls, found {calls:?}"));
    }
    Ok(())
}

#[then(r#"the failure for "{title}" is categorised as "{category}""#)]
fn failure_categorised(
    world: &TrackerPushWorld,
    title: String,
    category: String,
) -> Result<(), eyre::Report> {
    let expected = ErrorCategory::try_from(category.as_str())?;
    let run = world.run()?;
    let failure = run
        .failed
        .first()
        .ok_or_else(|| eyre::eyre!("expected a failed item"))?;

    if run.failed.len() != 1 || failure.category != expected {
        return Err(eyre::eyre!(
            "expected one {} failure, found {:?}",
            expected.as_str(),
            run.failed
        ));
    }
    if !failure.message.contains(title.as_str()) {
        return Err(eyre::eyre!(
            "failure message {:?} does not name {title}",
            failure.message
        ));
    }
    Ok(())
}
