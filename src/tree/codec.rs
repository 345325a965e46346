//! Tree Codec
//!
//! Flattens a [`Roadmap`] into one record per node and reassembles it. Descendant ids
//! are derived from the parent id plus 1-based position, and every level is written
//! in full before the next one starts so a concurrent reader never sees a child
//! whose parent is missing.
//!
//! Record layout:
//!
//! | table    | partition    | sort        |
//! |----------|--------------|-------------|
//! | roadmaps | roadmapId    |             |
//! | phases   | roadmapId    | phaseId     |
//! | topics   | phaseId      | topicId     |
//! | infobits | topicId      | infoBitId   |
//! | quizzes  | infoBitId    |             |

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::progress::{OverlayPatch, OverlayStore, ProgressStatus, UserRoadmap};
use crate::store::{
    get_json, put_json, query_json, scan_projected, InfoBitRecord, PhaseRecord, QuizRecord,
    RecordKey, RecordStore, RoadmapRecord, Table, TopicRecord,
};
use crate::tree::id::{self, DescendantIds};
use crate::tree::invariants::{self, InvariantViolation};
use crate::tree::{InfoBit, Phase, Quiz, Roadmap, Topic};
use crate::types::{new_roadmap_id, InfoBitId, RoadmapId, UserId};

/// Top-level fields a roadmap listing may project.
pub const SUMMARY_FIELDS: [&str; 6] = [
    "id",
    "title",
    "description",
    "imageURL",
    "phaseCount",
    "totalLessons",
];

/// Fields kept by [`RoadmapCodec::list`]. `id` is always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    pub fn summary() -> Self {
        Self {
            fields: SUMMARY_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = vec!["id".to_string()];
        for field in fields {
            let field = field.into();
            if !out.contains(&field) {
                out.push(field);
            }
        }
        Self { fields: out }
    }

    pub fn as_slice(&self) -> Vec<&str> {
        self.fields.iter().map(String::as_str).collect()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::summary()
    }
}

/// One row of a roadmap listing. Fields outside the projection stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapSummary {
    pub id: RoadmapId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "imageURL", default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub skill_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lessons: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_lesson: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<u32>,
}

impl RoadmapSummary {
    fn for_user(record: &RoadmapRecord, overlay: &UserRoadmap) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            image_url: record.image_url.clone(),
            skill_name: record.skill_name.clone(),
            phase_count: Some(record.phase_count),
            total_lessons: Some(record.total_lessons),
            status: Some(overlay.status),
            current_lesson: Some(overlay.current_lesson),
            current_phase: Some(overlay.current_phase),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadmapListing {
    pub items: Vec<RoadmapSummary>,
    /// More roadmaps exist than the requested limit allowed.
    pub truncated: bool,
}

/// A roadmap as one user sees it: every infobit carries `userAnswer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoadmapView {
    pub user_id: UserId,
    pub status: ProgressStatus,
    pub current_lesson: u32,
    pub current_phase: u32,
    #[serde(flatten)]
    pub roadmap: Roadmap,
}

/// Every record a tree occupies, grouped by level in write order.
struct Flattened {
    root: RoadmapRecord,
    phases: Vec<(RecordKey, PhaseRecord)>,
    topics: Vec<(RecordKey, TopicRecord)>,
    info_bits: Vec<(RecordKey, InfoBitRecord)>,
    quizzes: Vec<(RecordKey, QuizRecord)>,
}

impl Flattened {
    fn record_count(&self) -> usize {
        1 + self.phases.len() + self.topics.len() + self.info_bits.len() + self.quizzes.len()
    }
}

/// Outcome of [`RoadmapCodec::prune`].
struct Pruned {
    records: usize,
    info_bits: Vec<InfoBitId>,
}

fn flatten(roadmap_id: &RoadmapId, tree: &Roadmap) -> Flattened {
    let root = RoadmapRecord {
        id: roadmap_id.clone(),
        title: tree.title.clone(),
        description: tree.description.clone(),
        image_url: tree.image_url.clone(),
        skill_name: tree.skill_name.clone(),
        goal: tree.goal.clone(),
        estimated_learning_duration: tree.estimated_learning_duration.clone(),
        daily_time: tree.daily_time.clone(),
        current_skill_level: tree.current_skill_level.clone(),
        desired_skill_level: tree.desired_skill_level.clone(),
        phase_count: tree.phase_count,
        total_lessons: tree.total_lessons,
        updated_at: chrono::Utc::now().to_rfc3339(),
    };
    let mut flat = Flattened {
        root,
        phases: Vec::new(),
        topics: Vec::new(),
        info_bits: Vec::new(),
        quizzes: Vec::new(),
    };

    for (p, phase) in tree.phases.iter().enumerate() {
        let phase_id = id::phase_id(roadmap_id, p + 1);
        flat.phases.push((
            RecordKey::child(roadmap_id.as_str(), phase_id.as_str()),
            PhaseRecord {
                roadmap_id: roadmap_id.clone(),
                phase_id: phase_id.clone(),
                phase_number: phase.phase_number,
                phase_description: phase.phase_description.clone(),
                topic_count: phase.topic_count,
            },
        ));
        for (t, topic) in phase.topics.iter().enumerate() {
            let topic_id = id::topic_id(&phase_id, t + 1);
            flat.topics.push((
                RecordKey::child(phase_id.as_str(), topic_id.as_str()),
                TopicRecord {
                    phase_id: phase_id.clone(),
                    topic_id: topic_id.clone(),
                    topic_number: topic.topic_number,
                    topic_name: topic.topic_name.clone(),
                    topic_search_term: topic.topic_search_term.clone(),
                    topic_outline: topic.topic_outline.clone(),
                    search_result: topic.search_result.clone(),
                    infobit_count: topic.infobit_count,
                },
            ));
            for (b, bit) in topic.info_bits.iter().enumerate() {
                let info_bit_id = id::info_bit_id(&topic_id, b + 1);
                flat.info_bits.push((
                    RecordKey::child(topic_id.as_str(), info_bit_id.as_str()),
                    InfoBitRecord {
                        topic_id: topic_id.clone(),
                        info_bit_id: info_bit_id.clone(),
                        info_bit_number: bit.info_bit_number,
                        text: bit.text.clone(),
                        keywords: bit.keywords.clone(),
                        example: bit.example.clone(),
                    },
                ));
                if let Some(quiz) = &bit.quiz {
                    flat.quizzes.push((
                        RecordKey::root(info_bit_id.as_str()),
                        QuizRecord {
                            info_bit_id,
                            text: quiz.text.clone(),
                            quiz_type: quiz.quiz_type,
                            options: quiz.options.clone(),
                            answer: quiz.answer.clone().unwrap_or_default(),
                        },
                    ));
                }
            }
        }
    }
    flat
}

fn info_bit_key(info_bit_id: &str) -> RecordKey {
    RecordKey::child(id::parent_of(info_bit_id).unwrap_or_default(), info_bit_id)
}

fn topic_key(topic_id: &str) -> RecordKey {
    RecordKey::child(id::parent_of(topic_id).unwrap_or_default(), topic_id)
}

fn phase_key(phase_id: &str) -> RecordKey {
    RecordKey::child(id::roadmap_of(phase_id), phase_id)
}

/// Bidirectional mapping between [`Roadmap`] trees and flat records.
#[derive(Clone)]
pub struct RoadmapCodec {
    store: Arc<dyn RecordStore>,
    overlays: OverlayStore,
}

impl RoadmapCodec {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let overlays = OverlayStore::new(Arc::clone(&store));
        Self { store, overlays }
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.overlays
    }

    /// Persist a new roadmap under a freshly minted id.
    pub fn save(&self, tree: &Roadmap) -> Result<RoadmapId, ApiError> {
        invariants::validate_for_write(tree)?;
        let mut tree = tree.clone();
        invariants::recompute(&mut tree);
        let roadmap_id = new_roadmap_id();
        let written = self.write_tree(&roadmap_id, &tree)?;
        info!(
            roadmap_id = %roadmap_id,
            phases = tree.phase_count,
            lessons = tree.total_lessons,
            records = written,
            "Roadmap saved"
        );
        Ok(roadmap_id)
    }

    /// Reassemble a roadmap, ordering every level by its stored number.
    pub fn load(&self, roadmap_id: &str) -> Result<Roadmap, ApiError> {
        id::validate_root_id(roadmap_id)?;
        let root: RoadmapRecord = get_json(
            self.store.as_ref(),
            Table::Roadmaps,
            &RecordKey::root(roadmap_id),
        )?
        .ok_or_else(|| ApiError::NotFound(format!("roadmap {roadmap_id}")))?;

        let mut phase_records: Vec<PhaseRecord> =
            query_json(self.store.as_ref(), Table::Phases, roadmap_id)?;
        phase_records.sort_by_key(|p| p.phase_number);

        let mut phases = Vec::with_capacity(phase_records.len());
        for record in phase_records {
            let topics = self.load_topics(&record.phase_id)?;
            phases.push(Phase {
                id: Some(record.phase_id),
                phase_number: record.phase_number,
                phase_description: record.phase_description,
                topic_count: record.topic_count,
                topics,
            });
        }

        let tree = Roadmap {
            id: Some(root.id),
            title: root.title,
            description: root.description,
            image_url: root.image_url,
            skill_name: root.skill_name,
            goal: root.goal,
            estimated_learning_duration: root.estimated_learning_duration,
            daily_time: root.daily_time,
            current_skill_level: root.current_skill_level,
            desired_skill_level: root.desired_skill_level,
            phase_count: root.phase_count,
            total_lessons: root.total_lessons,
            phases,
        };

        for violation in invariants::check(&tree) {
            warn!(roadmap_id, %violation, "Stored roadmap violates an invariant");
        }
        debug!(roadmap_id, phases = tree.phases.len(), "Roadmap loaded");
        Ok(tree)
    }

    fn load_topics(&self, phase_id: &str) -> Result<Vec<Topic>, ApiError> {
        let mut records: Vec<TopicRecord> =
            query_json(self.store.as_ref(), Table::Topics, phase_id)?;
        records.sort_by_key(|t| t.topic_number);
        let mut topics = Vec::with_capacity(records.len());
        for record in records {
            let info_bits = self.load_info_bits(&record.topic_id)?;
            topics.push(Topic {
                id: Some(record.topic_id),
                topic_number: record.topic_number,
                topic_name: record.topic_name,
                topic_search_term: record.topic_search_term,
                topic_outline: record.topic_outline,
                search_result: record.search_result,
                infobit_count: record.infobit_count,
                info_bits,
            });
        }
        Ok(topics)
    }

    fn load_info_bits(&self, topic_id: &str) -> Result<Vec<InfoBit>, ApiError> {
        let mut records: Vec<InfoBitRecord> =
            query_json(self.store.as_ref(), Table::InfoBits, topic_id)?;
        records.sort_by_key(|b| b.info_bit_number);
        let mut bits = Vec::with_capacity(records.len());
        for record in records {
            let quiz: Option<QuizRecord> = get_json(
                self.store.as_ref(),
                Table::Quizzes,
                &RecordKey::root(record.info_bit_id.as_str()),
            )?;
            bits.push(InfoBit {
                id: Some(record.info_bit_id),
                info_bit_number: record.info_bit_number,
                text: record.text,
                keywords: record.keywords,
                example: record.example,
                quiz: quiz.map(|q| Quiz {
                    text: q.text,
                    quiz_type: q.quiz_type,
                    options: q.options,
                    answer: Some(q.answer),
                }),
                user_answer: None,
            });
        }
        Ok(bits)
    }

    /// Replace the whole subtree of an existing roadmap.
    ///
    /// Records left over from the previous shape are pruned after the rewrite.
    pub fn update(&self, roadmap_id: &str, tree: &Roadmap) -> Result<(), ApiError> {
        id::validate_root_id(roadmap_id)?;
        if self
            .store
            .get(Table::Roadmaps, &RecordKey::root(roadmap_id))?
            .is_none()
        {
            return Err(ApiError::NotFound(format!("roadmap {roadmap_id}")));
        }
        invariants::validate_for_write(tree)?;
        let mut tree = tree.clone();
        invariants::recompute(&mut tree);

        let roadmap_id = roadmap_id.to_string();
        let previous = self.stored_descendants(&roadmap_id)?;
        let written = self.write_tree(&roadmap_id, &tree)?;
        let current = DescendantIds::for_tree(&roadmap_id, &tree);
        let pruned = self.prune(&previous, &current)?;
        let stale: HashSet<&str> = pruned.info_bits.iter().map(String::as_str).collect();
        let overlays = self.overlays.forget_answers(&roadmap_id, &stale)?;
        info!(
            roadmap_id = %roadmap_id,
            records = written,
            pruned = pruned.records,
            overlays,
            "Roadmap updated"
        );
        Ok(())
    }

    /// Remove a roadmap and every descendant, one level at a time from the leaves up.
    pub fn delete(&self, roadmap_id: &str) -> Result<(), ApiError> {
        id::validate_root_id(roadmap_id)?;
        let root_key = RecordKey::root(roadmap_id);
        if self.store.get(Table::Roadmaps, &root_key)?.is_none() {
            return Err(ApiError::NotFound(format!("roadmap {roadmap_id}")));
        }
        let roadmap_id = roadmap_id.to_string();
        let stored = self.stored_descendants(&roadmap_id)?;
        let removed = self.prune(&stored, &DescendantIds::default())?;
        self.store.delete(Table::Roadmaps, &root_key)?;
        let overlays = self.overlays.delete_for_roadmap(&roadmap_id)?;
        info!(
            roadmap_id = %roadmap_id,
            records = removed.records + 1,
            overlays,
            "Roadmap deleted"
        );
        Ok(())
    }

    /// Scan roadmap roots, keeping only the projected fields.
    pub fn list(
        &self,
        projection: &Projection,
        limit: Option<usize>,
    ) -> Result<RoadmapListing, ApiError> {
        let (values, truncated) = scan_projected(
            self.store.as_ref(),
            Table::Roadmaps,
            &projection.as_slice(),
            limit,
        )?;
        let items = values
            .into_iter()
            .map(serde_json::from_value::<RoadmapSummary>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(crate::error::StorageError::from)?;
        if truncated {
            debug!(returned = items.len(), "Roadmap listing truncated");
        }
        Ok(RoadmapListing { items, truncated })
    }

    /// Create or patch one user's progress on a stored roadmap.
    ///
    /// Every answer key must name an infobit the roadmap currently stores.
    pub fn upsert_progress(
        &self,
        user_id: &str,
        roadmap_id: &str,
        patch: &OverlayPatch,
    ) -> Result<UserRoadmap, ApiError> {
        id::validate_root_id(roadmap_id)?;
        if self
            .store
            .get(Table::Roadmaps, &RecordKey::root(roadmap_id))?
            .is_none()
        {
            return Err(ApiError::NotFound(format!("roadmap {roadmap_id}")));
        }
        if let Some(answers) = patch.quiz_answers.as_ref().filter(|a| !a.is_empty()) {
            let stored = self.stored_descendants(&roadmap_id.to_string())?;
            let known: HashSet<&str> = stored.info_bits.iter().map(String::as_str).collect();
            if let Some(unknown) = answers.keys().find(|k| !known.contains(k.as_str())) {
                return Err(ApiError::Validation(format!(
                    "quiz answer key {unknown:?} is not an infobit of roadmap {roadmap_id}"
                )));
            }
        }
        self.overlays.upsert(user_id, roadmap_id, patch)
    }

    /// A roadmap merged with one user's overlay.
    pub fn load_for_user(
        &self,
        user_id: &str,
        roadmap_id: &str,
    ) -> Result<UserRoadmapView, ApiError> {
        let mut roadmap = self.load(roadmap_id)?;
        let overlay = self.overlays.get(user_id, roadmap_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("progress for user {user_id} on roadmap {roadmap_id}"))
        })?;
        for bit in roadmap.info_bits_mut() {
            let answer = bit
                .id
                .as_ref()
                .and_then(|id| overlay.quiz_answers.get(id))
                .cloned()
                .unwrap_or_default();
            bit.user_answer = Some(answer);
        }
        Ok(UserRoadmapView {
            user_id: overlay.user_id,
            status: overlay.status,
            current_lesson: overlay.current_lesson,
            current_phase: overlay.current_phase,
            roadmap,
        })
    }

    /// Summaries of every roadmap a user has progress on.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<RoadmapSummary>, ApiError> {
        let mut out = Vec::new();
        for overlay in self.overlays.list_for_user(user_id)? {
            let record: Option<RoadmapRecord> = get_json(
                self.store.as_ref(),
                Table::Roadmaps,
                &RecordKey::root(overlay.roadmap_id.as_str()),
            )?;
            match record {
                Some(record) => out.push(RoadmapSummary::for_user(&record, &overlay)),
                None => debug!(
                    user_id,
                    roadmap_id = %overlay.roadmap_id,
                    "Skipping overlay for missing roadmap"
                ),
            }
        }
        Ok(out)
    }

    /// Load a roadmap and report every invariant it violates.
    pub fn verify(&self, roadmap_id: &str) -> Result<Vec<InvariantViolation>, ApiError> {
        let tree = self.load(roadmap_id)?;
        Ok(invariants::check(&tree))
    }

    fn write_tree(&self, roadmap_id: &RoadmapId, tree: &Roadmap) -> Result<usize, ApiError> {
        let flat = flatten(roadmap_id, tree);
        let store = self.store.as_ref();
        put_json(
            store,
            Table::Roadmaps,
            &RecordKey::root(roadmap_id.as_str()),
            &flat.root,
        )?;
        for (key, record) in &flat.phases {
            put_json(store, Table::Phases, key, record)?;
        }
        for (key, record) in &flat.topics {
            put_json(store, Table::Topics, key, record)?;
        }
        for (key, record) in &flat.info_bits {
            put_json(store, Table::InfoBits, key, record)?;
        }
        for (key, record) in &flat.quizzes {
            put_json(store, Table::Quizzes, key, record)?;
        }
        Ok(flat.record_count())
    }

    /// Ids of every descendant currently stored under `roadmap_id`.
    fn stored_descendants(&self, roadmap_id: &RoadmapId) -> Result<DescendantIds, ApiError> {
        let mut ids = DescendantIds::default();
        let phases: Vec<PhaseRecord> =
            query_json(self.store.as_ref(), Table::Phases, roadmap_id)?;
        for phase in phases {
            let topics: Vec<TopicRecord> =
                query_json(self.store.as_ref(), Table::Topics, &phase.phase_id)?;
            for topic in topics {
                let bits: Vec<InfoBitRecord> =
                    query_json(self.store.as_ref(), Table::InfoBits, &topic.topic_id)?;
                ids.info_bits
                    .extend(bits.into_iter().map(|b| b.info_bit_id));
                ids.topics.push(topic.topic_id);
            }
            ids.phases.push(phase.phase_id);
        }
        Ok(ids)
    }

    /// Delete records in `previous` that `current` no longer occupies, leaves first.
    fn prune(&self, previous: &DescendantIds, current: &DescendantIds) -> Result<Pruned, ApiError> {
        let keep_bits: HashSet<&str> = current.info_bits.iter().map(String::as_str).collect();
        let keep_topics: HashSet<&str> = current.topics.iter().map(String::as_str).collect();
        let keep_phases: HashSet<&str> = current.phases.iter().map(String::as_str).collect();

        let stale_bits: Vec<&String> = previous
            .info_bits
            .iter()
            .filter(|id| !keep_bits.contains(id.as_str()))
            .collect();
        let stale_topics: Vec<&String> = previous
            .topics
            .iter()
            .filter(|id| !keep_topics.contains(id.as_str()))
            .collect();
        let stale_phases: Vec<&String> = previous
            .phases
            .iter()
            .filter(|id| !keep_phases.contains(id.as_str()))
            .collect();

        for bit in &stale_bits {
            self.store
                .delete(Table::Quizzes, &RecordKey::root(bit.as_str()))?;
        }
        for bit in &stale_bits {
            self.store.delete(Table::InfoBits, &info_bit_key(bit))?;
        }
        for topic in &stale_topics {
            self.store.delete(Table::Topics, &topic_key(topic))?;
        }
        for phase in &stale_phases {
            self.store.delete(Table::Phases, &phase_key(phase))?;
        }
        Ok(Pruned {
            records: stale_bits.len() * 2 + stale_topics.len() + stale_phases.len(),
            info_bits: stale_bits.into_iter().cloned().collect(),
        })
    }
}
