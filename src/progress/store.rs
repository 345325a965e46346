//! Per-user progress overlay store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, StorageError};
use crate::store::{get_json, query_json, RecordKey, RecordStore, Table};
use crate::tree::id;
use crate::tree::Roadmap;
use crate::types::{InfoBitId, RoadmapId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    Ongoing,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::Ongoing => "ongoing",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for ProgressStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "ongoing" => Ok(ProgressStatus::Ongoing),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(ApiError::Validation(format!("unknown status {other:?}"))),
        }
    }
}

/// Mutable progress a user has on one roadmap.
///
/// `quiz_answers` only holds answered infobits; an unanswered infobit is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoadmap {
    pub user_id: UserId,
    pub roadmap_id: RoadmapId,
    pub status: ProgressStatus,
    pub current_lesson: u32,
    pub current_phase: u32,
    #[serde(default)]
    pub quiz_answers: BTreeMap<InfoBitId, String>,
    #[serde(default)]
    pub updated_at: String,
}

impl UserRoadmap {
    fn fresh(user_id: &str, roadmap_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            roadmap_id: roadmap_id.to_string(),
            status: ProgressStatus::Ongoing,
            current_lesson: 1,
            current_phase: 1,
            quiz_answers: BTreeMap::new(),
            updated_at: String::new(),
        }
    }
}

/// Fields to change on an overlay. `None` leaves the stored value alone;
/// supplied answers are merged into the stored map key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPatch {
    #[serde(default)]
    pub status: Option<ProgressStatus>,
    #[serde(default)]
    pub current_lesson: Option<u32>,
    #[serde(default)]
    pub current_phase: Option<u32>,
    #[serde(default)]
    pub quiz_answers: Option<BTreeMap<InfoBitId, String>>,
}

impl OverlayPatch {
    /// Collect answers from a nested document carrying `userAnswer` per infobit.
    ///
    /// Infobits without an id or without an answer are skipped.
    pub fn from_answered_tree(tree: &Roadmap) -> Self {
        let answers: BTreeMap<InfoBitId, String> = tree
            .info_bits()
            .filter_map(|bit| match (&bit.id, &bit.user_answer) {
                (Some(id), Some(answer)) => Some((id.clone(), answer.clone())),
                _ => None,
            })
            .collect();
        Self {
            quiz_answers: Some(answers),
            ..Self::default()
        }
    }

    fn apply(&self, overlay: &mut UserRoadmap, now: &str) {
        if let Some(status) = self.status {
            overlay.status = status;
        }
        if let Some(lesson) = self.current_lesson {
            overlay.current_lesson = lesson;
        }
        if let Some(phase) = self.current_phase {
            overlay.current_phase = phase;
        }
        if let Some(answers) = &self.quiz_answers {
            for (id, answer) in answers {
                overlay.quiz_answers.insert(id.clone(), answer.clone());
            }
        }
        overlay.updated_at = now.to_string();
    }
}

/// Narrow key-value access to `(user, roadmap)` progress records.
#[derive(Clone)]
pub struct OverlayStore {
    store: Arc<dyn RecordStore>,
}

impl OverlayStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, user_id: &str, roadmap_id: &str) -> Result<Option<UserRoadmap>, ApiError> {
        let key = RecordKey::child(user_id, roadmap_id);
        Ok(get_json(self.store.as_ref(), Table::UserRoadmaps, &key)?)
    }

    /// Create the overlay if absent, otherwise patch only the supplied fields.
    ///
    /// Answer keys are only checked against the roadmap id; callers outside this crate
    /// go through [`RoadmapCodec::upsert_progress`](crate::tree::RoadmapCodec::upsert_progress),
    /// which also checks them against the stored tree.
    pub(crate) fn upsert(
        &self,
        user_id: &str,
        roadmap_id: &str,
        patch: &OverlayPatch,
    ) -> Result<UserRoadmap, ApiError> {
        if user_id.trim().is_empty() {
            return Err(ApiError::Validation("userId is required".to_string()));
        }
        if let Some(answers) = &patch.quiz_answers {
            if let Some(foreign) = answers.keys().find(|k| id::roadmap_of(k) != roadmap_id) {
                return Err(ApiError::Validation(format!(
                    "quiz answer key {foreign:?} does not belong to roadmap {roadmap_id}"
                )));
            }
        }

        let key = RecordKey::child(user_id, roadmap_id);
        let now = chrono::Utc::now().to_rfc3339();
        let mut failure: Option<StorageError> = None;
        let updated = self
            .store
            .update(Table::UserRoadmaps, &key, &mut |old| {
                failure = None;
                let mut overlay = match old {
                    Some(raw) => match serde_json::from_slice::<UserRoadmap>(raw) {
                        Ok(existing) => existing,
                        Err(e) => {
                            failure = Some(e.into());
                            return Some(raw.to_vec());
                        }
                    },
                    None => UserRoadmap::fresh(user_id, roadmap_id),
                };
                patch.apply(&mut overlay, &now);
                match serde_json::to_vec(&overlay) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        failure = Some(e.into());
                        old.map(<[u8]>::to_vec)
                    }
                }
            })?;
        if let Some(err) = failure {
            return Err(err.into());
        }
        let raw = updated.ok_or_else(|| {
            ApiError::StorageError(StorageError::NotFound {
                table: Table::UserRoadmaps.name().to_string(),
                key: key.to_string(),
            })
        })?;
        let overlay: UserRoadmap = serde_json::from_slice(&raw).map_err(StorageError::from)?;
        info!(
            user_id,
            roadmap_id,
            status = overlay.status.as_str(),
            answers = overlay.quiz_answers.len(),
            "Progress overlay upserted"
        );
        Ok(overlay)
    }

    /// Idempotent removal.
    pub fn delete(&self, user_id: &str, roadmap_id: &str) -> Result<(), ApiError> {
        self.store
            .delete(Table::UserRoadmaps, &RecordKey::child(user_id, roadmap_id))?;
        debug!(user_id, roadmap_id, "Progress overlay deleted");
        Ok(())
    }

    /// Every overlay on one roadmap, across users.
    pub fn list_for_roadmap(&self, roadmap_id: &str) -> Result<Vec<UserRoadmap>, ApiError> {
        let page = self.store.scan(Table::UserRoadmaps, None)?;
        let mut overlays = Vec::new();
        for raw in page.items {
            let overlay: UserRoadmap = serde_json::from_slice(&raw).map_err(StorageError::from)?;
            if overlay.roadmap_id == roadmap_id {
                overlays.push(overlay);
            }
        }
        Ok(overlays)
    }

    /// Drop answers for `info_bit_ids` from every overlay on `roadmap_id`.
    ///
    /// Returns the number of overlays that changed.
    pub fn forget_answers(
        &self,
        roadmap_id: &str,
        info_bit_ids: &HashSet<&str>,
    ) -> Result<usize, ApiError> {
        if info_bit_ids.is_empty() {
            return Ok(0);
        }
        let mut touched = 0;
        for overlay in self.list_for_roadmap(roadmap_id)? {
            if !overlay
                .quiz_answers
                .keys()
                .any(|k| info_bit_ids.contains(k.as_str()))
            {
                continue;
            }
            let key = RecordKey::child(overlay.user_id.as_str(), roadmap_id);
            let mut failure: Option<StorageError> = None;
            self.store.update(Table::UserRoadmaps, &key, &mut |old| {
                failure = None;
                let raw = old?;
                match serde_json::from_slice::<UserRoadmap>(raw) {
                    Ok(mut current) => {
                        current
                            .quiz_answers
                            .retain(|k, _| !info_bit_ids.contains(k.as_str()));
                        match serde_json::to_vec(&current) {
                            Ok(bytes) => Some(bytes),
                            Err(e) => {
                                failure = Some(e.into());
                                Some(raw.to_vec())
                            }
                        }
                    }
                    Err(e) => {
                        failure = Some(e.into());
                        Some(raw.to_vec())
                    }
                }
            })?;
            if let Some(err) = failure {
                return Err(err.into());
            }
            touched += 1;
        }
        debug!(roadmap_id, touched, "Stale quiz answers removed");
        Ok(touched)
    }

    /// Remove every user's overlay on `roadmap_id`.
    pub fn delete_for_roadmap(&self, roadmap_id: &str) -> Result<usize, ApiError> {
        let overlays = self.list_for_roadmap(roadmap_id)?;
        for overlay in &overlays {
            self.delete(&overlay.user_id, roadmap_id)?;
        }
        Ok(overlays.len())
    }

    /// Every overlay a user holds.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<UserRoadmap>, ApiError> {
        let mut overlays: Vec<UserRoadmap> =
            query_json(self.store.as_ref(), Table::UserRoadmaps, user_id)?;
        overlays.sort_by(|a, b| a.roadmap_id.cmp(&b.roadmap_id));
        Ok(overlays)
    }
}
