//! In-memory repository for planning lifecycle tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::planning::{
    domain::{
        Bug, BugId, BugLink, DecisionOutcome, DecisionRecord, DeletionConfirmation,
        DeletionReceipt, EntityKind, EntityRef, Epic, EpicId, EpicStage, EventDraft, EventId,
        Feature, FeatureId, ItemStage, LogEvent, ProposalId, StageGraph, StoryId, StoryParent,
        UserId, UserStory, may_overwrite,
    },
    ports::{PlanningRepository, PlanningRepositoryError, PlanningRepositoryResult},
};

/// Thread-safe in-memory planning repository.
///
/// Rows keep an insertion sequence so that listings follow creation order
/// even when a mocked clock hands out identical timestamps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanningRepository {
    state: Arc<RwLock<PlanningState>>,
}

#[derive(Debug)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct PlanningState {
    next_seq: u64,
    epics: HashMap<EpicId, Row<Epic>>,
    features: HashMap<FeatureId, Row<Feature>>,
    stories: HashMap<StoryId, Row<UserStory>>,
    bugs: HashMap<BugId, Row<Bug>>,
    links: Vec<BugLink>,
    decisions: Vec<DecisionRecord>,
    events: HashMap<EntityRef, Vec<LogEvent>>,
    receipts: Vec<DeletionReceipt>,
    fail_next_decision_append: bool,
}

impl PlanningState {
    const fn next_seq(&mut self) -> u64 {
        self.next_seq = self.next_seq.saturating_add(1);
        self.next_seq
    }

    fn contains(&self, entity: EntityRef) -> bool {
        match entity.kind() {
            EntityKind::Epic => self.epics.contains_key(&EpicId::from_uuid(entity.id())),
            EntityKind::Feature => self
                .features
                .contains_key(&FeatureId::from_uuid(entity.id())),
            EntityKind::Story => self.stories.contains_key(&StoryId::from_uuid(entity.id())),
            EntityKind::Bug => self.bugs.contains_key(&BugId::from_uuid(entity.id())),
        }
    }

    fn stories_of(&self, feature_ids: &HashSet<FeatureId>) -> Vec<StoryId> {
        self.stories
            .values()
            .filter(|row| match row.value.parent() {
                StoryParent::Feature(feature_id) => feature_ids.contains(&feature_id),
                StoryParent::Standalone(_) => false,
            })
            .map(|row| row.value.id())
            .collect()
    }

    /// Collects every entity removed together with `target`.
    fn cascade_set(&self, target: EntityRef) -> Vec<EntityRef> {
        let mut removed = vec![target];
        let feature_ids: HashSet<FeatureId> = match target.kind() {
            EntityKind::Epic => {
                let epic_id = EpicId::from_uuid(target.id());
                self.features
                    .values()
                    .filter(|row| row.value.epic_id() == epic_id)
                    .map(|row| row.value.id())
                    .collect()
            }
            EntityKind::Feature => HashSet::from([FeatureId::from_uuid(target.id())]),
            EntityKind::Story | EntityKind::Bug => HashSet::new(),
        };
        if target.kind() == EntityKind::Epic {
            removed.extend(feature_ids.iter().map(|id| EntityRef::feature(*id)));
        }
        removed.extend(
            self.stories_of(&feature_ids)
                .into_iter()
                .map(EntityRef::story),
        );
        removed
    }

    fn remove_entity(&mut self, entity: EntityRef) {
        match entity.kind() {
            EntityKind::Epic => {
                self.epics.remove(&EpicId::from_uuid(entity.id()));
            }
            EntityKind::Feature => {
                self.features.remove(&FeatureId::from_uuid(entity.id()));
            }
            EntityKind::Story => {
                self.stories.remove(&StoryId::from_uuid(entity.id()));
            }
            EntityKind::Bug => {
                self.bugs.remove(&BugId::from_uuid(entity.id()));
            }
        }
    }
}

impl InMemoryPlanningRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next decision-log append fail after the epic row has been
    /// written, so callers can observe that the write is rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::Persistence`] if the state lock is
    /// poisoned.
    pub fn fail_next_decision_append(&self) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        state.fail_next_decision_append = true;
        Ok(())
    }

    fn read_state(&self) -> PlanningRepositoryResult<RwLockReadGuard<'_, PlanningState>> {
        self.state.read().map_err(|err| {
            PlanningRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(&self) -> PlanningRepositoryResult<RwLockWriteGuard<'_, PlanningState>> {
        self.state.write().map_err(|err| {
            PlanningRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

fn sorted_by_seq<'a, T: Clone + 'a>(rows: impl Iterator<Item = &'a Row<T>>) -> Vec<T> {
    let mut selected: Vec<&Row<T>> = rows.collect();
    selected.sort_by_key(|row| row.seq);
    selected.into_iter().map(|row| row.value.clone()).collect()
}

fn guarded_update<K, T>(
    rows: &mut HashMap<K, Row<T>>,
    key: K,
    entity: EntityRef,
    incoming: &T,
    stored_stage: impl Fn(&T) -> ItemStage,
) -> PlanningRepositoryResult<()>
where
    K: std::hash::Hash + Eq,
    T: Clone,
{
    let row = rows
        .get_mut(&key)
        .ok_or_else(|| PlanningRepositoryError::NotFound(entity))?;
    if !may_overwrite(stored_stage(&row.value), stored_stage(incoming)) {
        return Err(PlanningRepositoryError::Conflict(entity));
    }
    row.value = incoming.clone();
    Ok(())
}

fn io_error(message: &str) -> PlanningRepositoryError {
    PlanningRepositoryError::persistence(std::io::Error::other(message.to_owned()))
}

#[async_trait]
impl PlanningRepository for InMemoryPlanningRepository {
    async fn store_epic(&self, epic: &Epic) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.epics.contains_key(&epic.id()) {
            return Err(PlanningRepositoryError::Duplicate(epic.entity_ref()));
        }
        let seq = state.next_seq();
        state.epics.insert(
            epic.id(),
            Row {
                seq,
                value: epic.clone(),
            },
        );
        Ok(())
    }

    async fn find_epic(&self, id: EpicId) -> PlanningRepositoryResult<Option<Epic>> {
        let state = self.read_state()?;
        Ok(state.epics.get(&id).map(|row| row.value.clone()))
    }

    async fn list_epics(&self, owner: UserId) -> PlanningRepositoryResult<Vec<Epic>> {
        let state = self.read_state()?;
        Ok(sorted_by_seq(
            state.epics.values().filter(|row| row.value.owner() == owner),
        ))
    }

    async fn rename_epic(&self, epic: &Epic) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        let row = state
            .epics
            .get_mut(&epic.id())
            .ok_or_else(|| PlanningRepositoryError::NotFound(epic.entity_ref()))?;
        if row.value.stage() == EpicStage::TERMINAL {
            return Err(PlanningRepositoryError::Conflict(epic.entity_ref()));
        }
        let mut data = row.value.to_persisted();
        data.content = data.content.retitled(epic.content().title());
        data.updated_at = epic.updated_at();
        row.value = Epic::from_persisted(data);
        Ok(())
    }

    async fn save_proposal(&self, epic: &Epic) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        let row = state
            .epics
            .get_mut(&epic.id())
            .ok_or_else(|| PlanningRepositoryError::NotFound(epic.entity_ref()))?;
        if row.value.pending_proposal().is_some() {
            return Err(PlanningRepositoryError::ProposalPending(epic.id()));
        }
        if row.value.stage() != epic.stage() {
            return Err(PlanningRepositoryError::Conflict(epic.entity_ref()));
        }
        let mut data = row.value.to_persisted();
        data.pending_proposal = epic.pending_proposal().cloned();
        data.updated_at = epic.updated_at();
        row.value = Epic::from_persisted(data);
        Ok(())
    }

    async fn commit_decision(
        &self,
        epic: &Epic,
        expected: &ProposalId,
        decision: &DecisionRecord,
    ) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        let previous = state
            .epics
            .get(&epic.id())
            .map(|row| row.value.clone())
            .ok_or_else(|| PlanningRepositoryError::NotFound(epic.entity_ref()))?;
        let still_pending = previous
            .pending_proposal()
            .is_some_and(|pending| &pending.proposal_id == expected);
        if !still_pending {
            return Err(PlanningRepositoryError::StaleProposal {
                epic_id: epic.id(),
                expected: expected.clone(),
            });
        }

        let mut data = previous.to_persisted();
        if decision.outcome == DecisionOutcome::Confirmed {
            data.content = data.content.with_field(decision.field, &decision.content);
        }
        data.stage = decision.to_stage;
        data.pending_proposal = None;
        data.updated_at = epic.updated_at();
        if let Some(row) = state.epics.get_mut(&epic.id()) {
            row.value = Epic::from_persisted(data);
        }

        if state.fail_next_decision_append {
            state.fail_next_decision_append = false;
            if let Some(row) = state.epics.get_mut(&epic.id()) {
                row.value = previous;
            }
            return Err(io_error("injected decision log failure"));
        }
        state.decisions.push(decision.clone());
        Ok(())
    }

    async fn list_decisions(
        &self,
        epic_id: EpicId,
    ) -> PlanningRepositoryResult<Vec<DecisionRecord>> {
        let state = self.read_state()?;
        Ok(state
            .decisions
            .iter()
            .filter(|record| record.epic_id == epic_id)
            .cloned()
            .collect())
    }

    async fn store_feature(&self, feature: &Feature) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.features.contains_key(&feature.id()) {
            return Err(PlanningRepositoryError::Duplicate(feature.entity_ref()));
        }
        if !state.epics.contains_key(&feature.epic_id()) {
            return Err(PlanningRepositoryError::NotFound(EntityRef::epic(
                feature.epic_id(),
            )));
        }
        let seq = state.next_seq();
        state.features.insert(
            feature.id(),
            Row {
                seq,
                value: feature.clone(),
            },
        );
        Ok(())
    }

    async fn update_feature(&self, feature: &Feature) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        guarded_update(
            &mut state.features,
            feature.id(),
            feature.entity_ref(),
            feature,
            Feature::stage,
        )
    }

    async fn find_feature(&self, id: FeatureId) -> PlanningRepositoryResult<Option<Feature>> {
        let state = self.read_state()?;
        Ok(state.features.get(&id).map(|row| row.value.clone()))
    }

    async fn list_features(&self, epic_id: EpicId) -> PlanningRepositoryResult<Vec<Feature>> {
        let state = self.read_state()?;
        Ok(sorted_by_seq(
            state
                .features
                .values()
                .filter(|row| row.value.epic_id() == epic_id),
        ))
    }

    async fn store_story(&self, story: &UserStory) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.stories.contains_key(&story.id()) {
            return Err(PlanningRepositoryError::Duplicate(story.entity_ref()));
        }
        if let Some(feature_id) = story.feature_id() {
            if !state.features.contains_key(&feature_id) {
                return Err(PlanningRepositoryError::NotFound(EntityRef::feature(
                    feature_id,
                )));
            }
        }
        let seq = state.next_seq();
        state.stories.insert(
            story.id(),
            Row {
                seq,
                value: story.clone(),
            },
        );
        Ok(())
    }

    async fn update_story(&self, story: &UserStory) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        guarded_update(
            &mut state.stories,
            story.id(),
            story.entity_ref(),
            story,
            UserStory::stage,
        )
    }

    async fn find_story(&self, id: StoryId) -> PlanningRepositoryResult<Option<UserStory>> {
        let state = self.read_state()?;
        Ok(state.stories.get(&id).map(|row| row.value.clone()))
    }

    async fn list_stories(
        &self,
        feature_id: FeatureId,
    ) -> PlanningRepositoryResult<Vec<UserStory>> {
        let state = self.read_state()?;
        Ok(sorted_by_seq(
            state
                .stories
                .values()
                .filter(|row| row.value.feature_id() == Some(feature_id)),
        ))
    }

    async fn store_bug(&self, bug: &Bug) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.bugs.contains_key(&bug.id()) {
            return Err(PlanningRepositoryError::Duplicate(bug.entity_ref()));
        }
        let seq = state.next_seq();
        state.bugs.insert(
            bug.id(),
            Row {
                seq,
                value: bug.clone(),
            },
        );
        Ok(())
    }

    async fn update_bug(&self, bug: &Bug) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        guarded_update(&mut state.bugs, bug.id(), bug.entity_ref(), bug, Bug::stage)
    }

    async fn find_bug(&self, id: BugId) -> PlanningRepositoryResult<Option<Bug>> {
        let state = self.read_state()?;
        Ok(state.bugs.get(&id).map(|row| row.value.clone()))
    }

    async fn store_bug_link(&self, link: &BugLink) -> PlanningRepositoryResult<()> {
        let mut state = self.write_state()?;
        if !state.bugs.contains_key(&link.bug_id) {
            return Err(PlanningRepositoryError::NotFound(EntityRef::bug(link.bug_id)));
        }
        if !state.contains(link.target) {
            return Err(PlanningRepositoryError::NotFound(link.target));
        }
        let duplicate = state
            .links
            .iter()
            .any(|existing| existing.bug_id == link.bug_id && existing.target == link.target);
        if duplicate {
            return Err(PlanningRepositoryError::Duplicate(EntityRef::bug(link.bug_id)));
        }
        state.links.push(link.clone());
        Ok(())
    }

    async fn list_bugs_linked_to(
        &self,
        targets: &[EntityRef],
    ) -> PlanningRepositoryResult<Vec<Bug>> {
        let state = self.read_state()?;
        let linked: HashSet<BugId> = state
            .links
            .iter()
            .filter(|link| targets.contains(&link.target))
            .map(|link| link.bug_id)
            .collect();
        Ok(sorted_by_seq(
            state
                .bugs
                .values()
                .filter(|row| linked.contains(&row.value.id())),
        ))
    }

    async fn append_event(
        &self,
        owner: EntityRef,
        draft: &EventDraft,
        created_at: DateTime<Utc>,
    ) -> PlanningRepositoryResult<LogEvent> {
        let mut state = self.write_state()?;
        if !state.contains(owner) {
            return Err(PlanningRepositoryError::NotFound(owner));
        }
        let log = state.events.entry(owner).or_default();
        let sequence = u64::try_from(log.len())
            .map_err(PlanningRepositoryError::persistence)?
            .saturating_add(1);
        let event = LogEvent {
            id: EventId::new(),
            owner,
            role: draft.role,
            content: draft.content.clone(),
            sequence,
            created_at,
        };
        log.push(event.clone());
        Ok(event)
    }

    async fn list_events(&self, owner: EntityRef) -> PlanningRepositoryResult<Vec<LogEvent>> {
        let state = self.read_state()?;
        Ok(state.events.get(&owner).cloned().unwrap_or_default())
    }

    async fn delete_cascade(
        &self,
        confirmation: &DeletionConfirmation,
        deleted_at: DateTime<Utc>,
    ) -> PlanningRepositoryResult<DeletionReceipt> {
        let mut state = self.write_state()?;
        let target = confirmation.target();
        if !state.contains(target) {
            return Err(PlanningRepositoryError::NotFound(target));
        }

        let removed = state.cascade_set(target);
        let mut cascaded: usize = 0;
        if target.kind() == EntityKind::Epic {
            let epic_id = EpicId::from_uuid(target.id());
            let before = state.decisions.len();
            state.decisions.retain(|record| record.epic_id != epic_id);
            cascaded = cascaded.saturating_add(before.saturating_sub(state.decisions.len()));
        }
        for entity in &removed {
            if let Some(events) = state.events.remove(entity) {
                cascaded = cascaded.saturating_add(events.len());
            }
            state.remove_entity(*entity);
        }
        state.links.retain(|link| {
            !removed.contains(&link.target) && !removed.contains(&EntityRef::bug(link.bug_id))
        });

        let receipt = DeletionReceipt {
            target,
            actor: confirmation.actor(),
            reason: confirmation.reason().to_owned(),
            cascaded_rows: u64::try_from(cascaded).map_err(PlanningRepositoryError::persistence)?,
            deleted_at,
        };
        state.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn list_deletion_receipts(
        &self,
        actor: UserId,
    ) -> PlanningRepositoryResult<Vec<DeletionReceipt>> {
        let state = self.read_state()?;
        Ok(state
            .receipts
            .iter()
            .filter(|receipt| receipt.actor == actor)
            .cloned()
            .collect())
    }
}
