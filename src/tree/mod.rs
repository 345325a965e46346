//! Roadmap Tree
//!
//! The four-level learning tree (Roadmap → Phase → Topic → InfoBit, one Quiz per
//! InfoBit) as it travels between the generator, the scheduler and the record store.
//! Field names serialize in the camelCase document shape consumers read back.

pub mod codec;
pub mod id;
pub mod invariants;

pub use codec::{Projection, RoadmapCodec, RoadmapListing, RoadmapSummary, UserRoadmapView};

use crate::types::{InfoBitId, PhaseId, RoadmapId, TopicId};
use serde::{Deserialize, Serialize};

/// Root of a learning roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RoadmapId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
    #[serde(default)]
    pub skill_name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub estimated_learning_duration: String,
    #[serde(default)]
    pub daily_time: String,
    #[serde(default)]
    pub current_skill_level: String,
    #[serde(default)]
    pub desired_skill_level: String,
    #[serde(default)]
    pub phase_count: u32,
    #[serde(default)]
    pub total_lessons: u32,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    #[serde(rename = "phaseId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PhaseId>,
    #[serde(default)]
    pub phase_number: u32,
    pub phase_description: String,
    #[serde(default)]
    pub topic_count: u32,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(rename = "topicId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TopicId>,
    /// Global ordinal across the whole roadmap (1..=totalLessons).
    #[serde(default)]
    pub topic_number: u32,
    pub topic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_outline: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_result: Option<SearchResult>,
    #[serde(default)]
    pub infobit_count: u32,
    #[serde(default)]
    pub info_bits: Vec<InfoBit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBit {
    #[serde(rename = "infoBitId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<InfoBitId>,
    #[serde(default)]
    pub info_bit_number: u32,
    pub text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    /// Only populated on per-user reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(alias = "question")]
    pub text: String,
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizType {
    #[serde(
        rename = "multiple-choice",
        alias = "multiple_choice",
        alias = "Multiple Choice",
        alias = "multiple choice"
    )]
    MultipleChoice,
    #[serde(
        rename = "true-false",
        alias = "true_false",
        alias = "True/False",
        alias = "true/false",
        alias = "True or False"
    )]
    TrueFalse,
    #[serde(
        rename = "short-answer",
        alias = "short_answer",
        alias = "Short Answer",
        alias = "short answer"
    )]
    ShortAnswer,
}

/// Web and video resources found for a topic. A topic carrying one is "enriched".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default, alias = "webResult")]
    pub web_results: Vec<WebResult>,
    #[serde(default, alias = "videoResult")]
    pub video_results: Vec<VideoResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub title: String,
    #[serde(alias = "link")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

impl Roadmap {
    /// All topics in document order.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.phases.iter().flat_map(|p| p.topics.iter())
    }

    pub fn info_bits(&self) -> impl Iterator<Item = &InfoBit> {
        self.topics().flat_map(|t| t.info_bits.iter())
    }

    pub fn info_bits_mut(&mut self) -> impl Iterator<Item = &mut InfoBit> {
        self.phases
            .iter_mut()
            .flat_map(|p| p.topics.iter_mut())
            .flat_map(|t| t.info_bits.iter_mut())
    }

    pub fn enriched_topic_count(&self) -> usize {
        self.topics().filter(|t| t.is_enriched()).count()
    }

    pub fn is_fully_enriched(&self) -> bool {
        self.topics().all(Topic::is_enriched)
    }
}

impl Topic {
    pub fn is_enriched(&self) -> bool {
        self.search_result.is_some()
    }

    /// Term handed to Resource Search. Falls back to the topic name scoped by the roadmap title.
    pub fn search_term(&self, roadmap_title: &str) -> String {
        match self.topic_search_term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term.to_string(),
            _ if roadmap_title.trim().is_empty() => self.topic_name.clone(),
            _ => format!("{} {}", self.topic_name, roadmap_title.trim()),
        }
    }
}
