//! Planning repository behaviour that only a real database can show.

use std::sync::Arc;

use crate::postgres::helpers::{TestDatabase, test_runtime};
use diesel::connection::SimpleConnection;
use eyre::{Result, ensure, eyre};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use plansync::planning::{
    adapters::postgres::PostgresPlanningRepository,
    domain::{
        DeletionConfirmation, Epic, EpicField, EpicStage, EventDraft, EventRole,
        PlanningDomainError, ProposalId, UserId,
    },
    services::{LifecycleError, LifecycleService, ProposeRequest},
};
use rstest::rstest;

type Service = LifecycleService<PostgresPlanningRepository, DefaultClock>;

const FAIL_DECISION_INSERTS: &str = "
CREATE FUNCTION fail_decision_insert() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'decision log unavailable';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER decision_logs_fail_insert
    BEFORE INSERT ON decision_logs
    FOR EACH ROW EXECUTE FUNCTION fail_decision_insert();
";

fn service(db: &TestDatabase) -> Result<Service> {
    let repository = PostgresPlanningRepository::new(db.pool(4)?);
    Ok(LifecycleService::new(
        Arc::new(repository),
        Arc::new(DefaultClock),
    ))
}

async fn epic_with_proposal(service: &Service, owner: UserId) -> Result<(Epic, ProposalId)> {
    let epic = service.create_epic(owner, "Checkout revamp").await?;
    let proposal = service
        .propose(ProposeRequest::new(
            epic.id(),
            EpicField::ProblemStatement,
            "Carts are abandoned",
            EpicStage::OutcomeCapture,
        ))
        .await?;
    Ok((epic, proposal.proposal_id))
}

#[rstest]
fn failed_decision_write_leaves_epic_untouched(
    shared_test_cluster: &'static TestCluster,
) -> Result<()> {
    let db = TestDatabase::create(shared_test_cluster, "confirm_atomic")?;
    let service = service(&db)?;
    let rt = test_runtime()?;

    rt.block_on(async {
        let owner = UserId::new();
        let (epic, proposal_id) = epic_with_proposal(&service, owner).await?;
        db.connect()?.batch_execute(FAIL_DECISION_INSERTS)?;

        let outcome = service.confirm(epic.id(), &proposal_id).await;

        ensure!(
            matches!(outcome, Err(LifecycleError::Repository(_))),
            "expected a repository failure, got {outcome:?}"
        );
        let stored = service.get_epic(epic.id()).await?;
        ensure!(stored.stage() == EpicStage::ProblemCapture);
        ensure!(stored.content().field(EpicField::ProblemStatement).is_none());
        ensure!(
            stored
                .pending_proposal()
                .is_some_and(|pending| pending.proposal_id == proposal_id)
        );
        ensure!(service.list_decisions(epic.id()).await?.is_empty());

        db.connect()?
            .batch_execute("DROP TRIGGER decision_logs_fail_insert ON decision_logs")?;
        let confirmed = service.confirm(epic.id(), &proposal_id).await?;
        ensure!(confirmed.stage() == EpicStage::OutcomeCapture);
        ensure!(service.list_decisions(epic.id()).await?.len() == 1);
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn concurrent_confirms_commit_exactly_once(
    shared_test_cluster: &'static TestCluster,
) -> Result<()> {
    let db = TestDatabase::create(shared_test_cluster, "confirm_race")?;
    let service = service(&db)?;
    let rt = test_runtime()?;

    rt.block_on(async {
        let owner = UserId::new();
        for _ in 0..4 {
            let (epic, pending) = epic_with_proposal(&service, owner).await?;

            let (first, second) = tokio::join!(
                service.confirm(epic.id(), &pending),
                service.confirm(epic.id(), &pending),
            );

            let outcomes = [first, second];
            let confirmed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
            ensure!(confirmed == 1, "confirmed {confirmed} times");
            ensure!(outcomes.iter().any(|outcome| matches!(
                outcome,
                Err(LifecycleError::Domain(
                    PlanningDomainError::ProposalMismatch { .. }
                        | PlanningDomainError::NoPendingProposal { .. }
                ))
            )));
            ensure!(service.list_decisions(epic.id()).await?.len() == 1);
            let stored = service.get_epic(epic.id()).await?;
            ensure!(stored.stage() == EpicStage::OutcomeCapture);
            ensure!(stored.pending_proposal().is_none());
        }
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn append_only_rows_leave_only_through_confirmed_cascade(
    shared_test_cluster: &'static TestCluster,
) -> Result<()> {
    let db = TestDatabase::create(shared_test_cluster, "append_only")?;
    let service = service(&db)?;
    let rt = test_runtime()?;

    rt.block_on(async {
        let owner = UserId::new();
        let (epic, pending) = epic_with_proposal(&service, owner).await?;
        service
            .append_transcript(epic.id(), EventDraft::new(EventRole::User, "Why now?"))
            .await?;
        service.confirm(epic.id(), &pending).await?;

        let mut raw = db.connect()?;
        let deleted = raw.batch_execute("DELETE FROM decision_logs");
        ensure!(
            deleted
                .as_ref()
                .is_err_and(|err| err.to_string().contains("confirmed cascade deletion")),
            "plain delete was not rejected: {deleted:?}"
        );
        let edited = raw.batch_execute("UPDATE transcript_events SET content = 'edited'");
        ensure!(
            edited
                .as_ref()
                .is_err_and(|err| err.to_string().contains("append-only")),
            "update was not rejected: {edited:?}"
        );
        ensure!(service.list_decisions(epic.id()).await?.len() == 1);
        let transcript = service.list_transcript(epic.id()).await?;
        ensure!(transcript.len() == 1);

        let confirmation =
            DeletionConfirmation::new(epic.entity_ref(), owner, "duplicate of another epic")?;
        let receipt = service.delete_epic(epic.id(), &confirmation).await?;

        ensure!(receipt.cascaded_rows == 2, "cascaded {}", receipt.cascaded_rows);
        ensure!(matches!(
            service.get_epic(epic.id()).await,
            Err(LifecycleError::NotFound(_))
        ));
        ensure!(service.list_decisions(epic.id()).await?.is_empty());
        let receipts = service.list_deletion_receipts(owner).await?;
        let [listed] = receipts.as_slice() else {
            return Err(eyre!("expected one receipt, found {}", receipts.len()));
        };
        ensure!(listed.target == epic.entity_ref() && listed.actor == owner);
        ensure!(listed.reason == "duplicate of another epic" && listed.cascaded_rows == 2);
        ensure!(raw.batch_execute("DELETE FROM deletion_receipts").is_err());
        Ok::<_, eyre::Report>(())
    })
}
