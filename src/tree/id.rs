//! Descendant id derivation
//!
//! Every descendant id is derived from its parent id and its 1-based position:
//!
//! - phaseId   = roadmapId + "#PHASE#" + n
//! - topicId   = phaseId   + "#TOPIC#" + n
//! - infoBitId = topicId   + "#INFOBIT#" + n
//!
//! Quizzes are keyed by their owning infoBitId.

use crate::error::ApiError;
use crate::types::{InfoBitId, PhaseId, RoadmapId, TopicId};

pub const PHASE_SEP: &str = "#PHASE#";
pub const TOPIC_SEP: &str = "#TOPIC#";
pub const INFOBIT_SEP: &str = "#INFOBIT#";

pub fn phase_id(roadmap_id: &str, position: usize) -> PhaseId {
    format!("{roadmap_id}{PHASE_SEP}{position}")
}

pub fn topic_id(phase_id: &str, position: usize) -> TopicId {
    format!("{phase_id}{TOPIC_SEP}{position}")
}

pub fn info_bit_id(topic_id: &str, position: usize) -> InfoBitId {
    format!("{topic_id}{INFOBIT_SEP}{position}")
}

/// Roadmap id owning any derived id (or the id itself for a root).
pub fn roadmap_of(id: &str) -> &str {
    id.split_once(PHASE_SEP).map(|(root, _)| root).unwrap_or(id)
}

/// Id of the record that owns `id`, or `None` for a root id.
pub fn parent_of(id: &str) -> Option<&str> {
    [INFOBIT_SEP, TOPIC_SEP, PHASE_SEP]
        .iter()
        .find_map(|sep| id.rsplit_once(sep).map(|(parent, _)| parent))
}

/// Reject root ids that would make derived ids ambiguous.
pub fn validate_root_id(roadmap_id: &str) -> Result<(), ApiError> {
    if roadmap_id.trim().is_empty() {
        return Err(ApiError::Validation("roadmap id cannot be empty".to_string()));
    }
    if roadmap_id.contains('#') {
        return Err(ApiError::Validation(format!(
            "roadmap id {roadmap_id:?} must not contain '#'"
        )));
    }
    Ok(())
}

/// Every id the tree occupies when written under `roadmap_id`, in write order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DescendantIds {
    pub phases: Vec<PhaseId>,
    pub topics: Vec<TopicId>,
    pub info_bits: Vec<InfoBitId>,
}

impl DescendantIds {
    pub fn for_tree(roadmap_id: &RoadmapId, roadmap: &crate::tree::Roadmap) -> Self {
        let mut ids = Self::default();
        for (p, phase) in roadmap.phases.iter().enumerate() {
            let pid = phase_id(roadmap_id, p + 1);
            for (t, topic) in phase.topics.iter().enumerate() {
                let tid = topic_id(&pid, t + 1);
                for b in 0..topic.info_bits.len() {
                    ids.info_bits.push(info_bit_id(&tid, b + 1));
                }
                ids.topics.push(tid);
            }
            ids.phases.push(pid);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::fixtures;

    #[test]
    fn ids_nest_under_their_parent() {
        let p = phase_id("r1", 2);
        let t = topic_id(&p, 3);
        let b = info_bit_id(&t, 1);
        assert_eq!(p, "r1#PHASE#2");
        assert_eq!(t, "r1#PHASE#2#TOPIC#3");
        assert_eq!(b, "r1#PHASE#2#TOPIC#3#INFOBIT#1");
        assert_eq!(roadmap_of(&b), "r1");
        assert_eq!(roadmap_of("r1"), "r1");
        assert_eq!(parent_of(&b), Some(t.as_str()));
        assert_eq!(parent_of(&t), Some(p.as_str()));
        assert_eq!(parent_of(&p), Some("r1"));
        assert_eq!(parent_of("r1"), None);
    }

    #[test]
    fn root_ids_with_separator_are_rejected() {
        assert!(validate_root_id("abc").is_ok());
        assert!(validate_root_id("a#b").is_err());
        assert!(validate_root_id(" ").is_err());
    }

    #[test]
    fn descendant_ids_are_deterministic() {
        let tree = fixtures::shaped(&[&[2, 1], &[1]]);
        let a = DescendantIds::for_tree(&"r".to_string(), &tree);
        let b = DescendantIds::for_tree(&"r".to_string(), &tree);
        assert_eq!(a, b);
        assert_eq!(a.phases.len(), 2);
        assert_eq!(a.topics.len(), 3);
        assert_eq!(a.info_bits.len(), 4);
        assert_eq!(a.info_bits[1], "r#PHASE#1#TOPIC#1#INFOBIT#2");
    }
}
