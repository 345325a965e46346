//! Generation Pipeline
//!
//! Builds a roadmap from a learner request: skeleton, then infobits and quizzes per
//! phase, then a final comprehensive quiz appended as its own phase. The assembled
//! tree is recomputed, enriched through the continuation scheduler and persisted.
//! Callers get either the stored roadmap or an error; nothing is saved on failure.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::error::ApiError;
use crate::generator::{generate_json, Generator, PromptKind};
use crate::scheduler::ContinuationScheduler;
use crate::tree::invariants::{self, MAX_KEYWORDS};
use crate::tree::{InfoBit, Phase, Quiz, QuizType, Roadmap, RoadmapCodec, SearchResult, Topic};

pub const FINAL_PHASE_DESCRIPTION: &str = "Final Assessment";
pub const FINAL_TOPIC_NAME: &str = "Comprehensive Quiz";

/// What the learner asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapRequest {
    pub skill_name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub current_skill_level: String,
    #[serde(default)]
    pub desired_skill_level: String,
    #[serde(default)]
    pub estimated_learning_duration: String,
    #[serde(default)]
    pub daily_time: String,
}

impl RoadmapRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.skill_name.trim().is_empty() {
            return Err(ApiError::Validation("skillName is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Skeleton {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "imageURL", default)]
    image_url: String,
    phases: Vec<SkeletonPhase>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkeletonPhase {
    phase_description: String,
    topics: Vec<SkeletonTopic>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkeletonTopic {
    topic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_search_term: Option<String>,
    #[serde(default)]
    topic_outline: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InfoBitsOutput {
    phases: Vec<InfoBitsPhase>,
}

#[derive(Debug, Deserialize)]
struct InfoBitsPhase {
    topics: Vec<InfoBitsTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoBitsTopic {
    #[serde(default)]
    topic_name: String,
    #[serde(default)]
    info_bits: Vec<GeneratedInfoBit>,
}

#[derive(Debug, Deserialize)]
struct GeneratedInfoBit {
    text: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    example: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhaseQuizOutput {
    topics: Vec<QuizTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizTopic {
    #[serde(default)]
    topic_name: String,
    questions: Vec<Quiz>,
}

#[derive(Debug, Deserialize)]
struct FinalQuizOutput {
    questions: Vec<FinalQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalQuestion {
    topic_number: u32,
    question: String,
    #[serde(rename = "type")]
    quiz_type: QuizType,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
}

pub struct GenerationPipeline {
    generator: Arc<dyn Generator>,
    scheduler: Arc<ContinuationScheduler>,
    codec: Arc<RoadmapCodec>,
}

impl GenerationPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        scheduler: Arc<ContinuationScheduler>,
        codec: Arc<RoadmapCodec>,
    ) -> Self {
        Self {
            generator,
            scheduler,
            codec,
        }
    }

    /// Generate, enrich and persist. Returns the roadmap as stored.
    #[instrument(skip(self, request), fields(skill = %request.skill_name))]
    pub async fn generate(&self, request: &RoadmapRequest) -> Result<Roadmap, ApiError> {
        let tree = self.assemble(request).await?;
        let tree = self.scheduler.enrich(tree).await?;
        let roadmap_id = self.codec.save(&tree)?;
        info!(roadmap_id = %roadmap_id, "Generated roadmap persisted");
        self.codec.load(&roadmap_id)
    }

    /// Everything up to enrichment: a complete, recomputed, unsaved tree.
    pub async fn assemble(&self, request: &RoadmapRequest) -> Result<Roadmap, ApiError> {
        request.validate()?;
        let generator = self.generator.as_ref();
        let profile = serde_json::to_value(request)
            .map_err(|e| ApiError::Validation(format!("invalid request: {e}")))?;

        let skeleton: Skeleton = generate_json(generator, PromptKind::Skeleton, &profile).await?;
        if skeleton.phases.is_empty() {
            return Err(ApiError::Validation("skeleton has no phases".to_string()));
        }
        debug!(phases = skeleton.phases.len(), "Skeleton generated");

        let expansions = skeleton.phases.iter().map(|phase| {
            let input = json!({
                "title": skeleton.title,
                "description": skeleton.description,
                "goal": request.goal,
                "currentSkillLevel": request.current_skill_level,
                "desiredSkillLevel": request.desired_skill_level,
                "phases": [phase],
            });
            async move {
                let output: InfoBitsOutput =
                    generate_json(generator, PromptKind::InfoBits, &input).await?;
                Ok::<_, ApiError>(output)
            }
        });
        let expansions = try_join_all(expansions).await?;

        let mut phases = Vec::with_capacity(skeleton.phases.len() + 1);
        for (p, (outline, expansion)) in skeleton.phases.into_iter().zip(expansions).enumerate() {
            phases.push(expand_phase(p + 1, outline, expansion)?);
        }
        debug!("Infobits generated for every phase");

        let quizzes = phases.iter().map(|phase| {
            let input = json!({
                "title": skeleton.title,
                "currentSkillLevel": request.current_skill_level,
                "desiredSkillLevel": request.desired_skill_level,
                "phases": [phase],
            });
            async move {
                let output: PhaseQuizOutput =
                    generate_json(generator, PromptKind::PhaseQuiz, &input).await?;
                Ok::<_, ApiError>(output)
            }
        });
        let quizzes = try_join_all(quizzes).await?;
        for (p, (phase, quiz)) in phases.iter_mut().zip(quizzes).enumerate() {
            attach_quizzes(p + 1, phase, quiz)?;
        }
        debug!("Phase quizzes attached");

        let mut tree = Roadmap {
            id: None,
            title: skeleton.title,
            description: skeleton.description,
            image_url: skeleton.image_url,
            skill_name: request.skill_name.clone(),
            goal: request.goal.clone(),
            estimated_learning_duration: request.estimated_learning_duration.clone(),
            daily_time: request.daily_time.clone(),
            current_skill_level: request.current_skill_level.clone(),
            desired_skill_level: request.desired_skill_level.clone(),
            phase_count: 0,
            total_lessons: 0,
            phases,
        };
        // topicNumber must be final before the final quiz can reference it
        invariants::recompute(&mut tree);

        let final_input = final_quiz_input(&tree);
        let final_quiz: FinalQuizOutput =
            generate_json(generator, PromptKind::FinalQuiz, &final_input).await?;
        let final_phase = final_assessment(&tree, final_quiz)?;
        tree.phases.push(final_phase);
        invariants::recompute(&mut tree);
        invariants::validate_for_write(&tree)?;

        info!(
            phases = tree.phase_count,
            lessons = tree.total_lessons,
            "Roadmap assembled"
        );
        Ok(tree)
    }
}

fn expand_phase(
    number: usize,
    outline: SkeletonPhase,
    expansion: InfoBitsOutput,
) -> Result<Phase, ApiError> {
    let generated: Vec<InfoBitsTopic> = expansion
        .phases
        .into_iter()
        .flat_map(|p| p.topics)
        .collect();
    if generated.len() != outline.topics.len() {
        return Err(ApiError::Validation(format!(
            "phase {number}: skeleton has {} topics but {} were expanded",
            outline.topics.len(),
            generated.len()
        )));
    }

    let topics = outline
        .topics
        .into_iter()
        .zip(generated)
        .map(|(planned, expanded)| {
            if !expanded.topic_name.is_empty() && expanded.topic_name != planned.topic_name {
                debug!(
                    planned = %planned.topic_name,
                    expanded = %expanded.topic_name,
                    "Expanded topic renamed; keeping skeleton name"
                );
            }
            Topic {
                id: None,
                topic_number: 0,
                topic_name: planned.topic_name,
                topic_search_term: planned.topic_search_term,
                topic_outline: planned.topic_outline,
                search_result: None,
                infobit_count: 0,
                info_bits: expanded.info_bits.into_iter().map(into_info_bit).collect(),
            }
        })
        .collect();

    Ok(Phase {
        id: None,
        phase_number: 0,
        phase_description: outline.phase_description,
        topic_count: 0,
        topics,
    })
}

fn into_info_bit(generated: GeneratedInfoBit) -> InfoBit {
    let mut keywords = generated.keywords;
    keywords.truncate(MAX_KEYWORDS);
    InfoBit {
        id: None,
        info_bit_number: 0,
        text: generated.text,
        keywords,
        example: generated.example.filter(|e| !e.trim().is_empty()),
        quiz: None,
        user_answer: None,
    }
}

/// Question i of a topic belongs to infobit i.
fn attach_quizzes(number: usize, phase: &mut Phase, output: PhaseQuizOutput) -> Result<(), ApiError> {
    if output.topics.len() != phase.topics.len() {
        return Err(ApiError::Validation(format!(
            "phase {number}: {} topics but quizzes for {}",
            phase.topics.len(),
            output.topics.len()
        )));
    }
    for (topic, quiz_topic) in phase.topics.iter_mut().zip(output.topics) {
        if quiz_topic.questions.len() != topic.info_bits.len() {
            return Err(ApiError::Validation(format!(
                "phase {number} topic {:?}: {} infobits but {} questions",
                topic.topic_name,
                topic.info_bits.len(),
                quiz_topic.questions.len()
            )));
        }
        if !quiz_topic.topic_name.is_empty() && quiz_topic.topic_name != topic.topic_name {
            debug!(topic = %topic.topic_name, quiz_topic = %quiz_topic.topic_name, "Quiz topic name differs");
        }
        for (info_bit, quiz) in topic.info_bits.iter_mut().zip(quiz_topic.questions) {
            info_bit.quiz = Some(quiz);
        }
    }
    Ok(())
}

fn final_quiz_input(tree: &Roadmap) -> Value {
    let topics: Vec<Value> = tree
        .topics()
        .map(|t| json!({"topicNumber": t.topic_number, "topicName": t.topic_name}))
        .collect();
    json!({
        "title": tree.title,
        "description": tree.description,
        "currentSkillLevel": tree.current_skill_level,
        "desiredSkillLevel": tree.desired_skill_level,
        "topics": topics,
    })
}

/// One infobit per question, each naming the lesson it reviews. The topic carries an
/// empty search result so enrichment skips it.
fn final_assessment(tree: &Roadmap, output: FinalQuizOutput) -> Result<Phase, ApiError> {
    if output.questions.is_empty() {
        return Err(ApiError::Validation("final quiz has no questions".to_string()));
    }
    let info_bits = output
        .questions
        .into_iter()
        .map(|q| {
            let reviewed = tree
                .topics()
                .find(|t| t.topic_number == q.topic_number)
                .ok_or_else(|| {
                    ApiError::Validation(format!(
                        "final quiz references unknown topicNumber {}",
                        q.topic_number
                    ))
                })?;
            Ok(InfoBit {
                id: None,
                info_bit_number: 0,
                text: format!("Review of lesson {}: {}", q.topic_number, reviewed.topic_name),
                keywords: vec![reviewed.topic_name.clone()],
                example: None,
                quiz: Some(Quiz {
                    text: q.question,
                    quiz_type: q.quiz_type,
                    options: q.options,
                    answer: Some(q.answer),
                }),
                user_answer: None,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Phase {
        id: None,
        phase_number: 0,
        phase_description: FINAL_PHASE_DESCRIPTION.to_string(),
        topic_count: 0,
        topics: vec![Topic {
            id: None,
            topic_number: 0,
            topic_name: FINAL_TOPIC_NAME.to_string(),
            topic_search_term: None,
            topic_outline: Vec::new(),
            search_result: Some(SearchResult::default()),
            infobit_count: 0,
            info_bits,
        }],
    })
}
