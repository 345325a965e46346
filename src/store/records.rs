//! Stored record shapes, one per table.

use crate::tree::{QuizType, SearchResult};
use crate::types::{InfoBitId, PhaseId, RoadmapId, TopicId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapRecord {
    pub id: RoadmapId,
    pub title: String,
    pub description: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub skill_name: String,
    pub goal: String,
    pub estimated_learning_duration: String,
    pub daily_time: String,
    pub current_skill_level: String,
    pub desired_skill_level: String,
    pub phase_count: u32,
    pub total_lessons: u32,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    pub roadmap_id: RoadmapId,
    pub phase_id: PhaseId,
    pub phase_number: u32,
    pub phase_description: String,
    pub topic_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecord {
    pub phase_id: PhaseId,
    pub topic_id: TopicId,
    pub topic_number: u32,
    pub topic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_search_term: Option<String>,
    #[serde(default)]
    pub topic_outline: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_result: Option<SearchResult>,
    pub infobit_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBitRecord {
    pub topic_id: TopicId,
    pub info_bit_id: InfoBitId,
    pub info_bit_number: u32,
    pub text: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
    pub info_bit_id: InfoBitId,
    pub text: String,
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
}
