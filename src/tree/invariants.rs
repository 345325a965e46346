//! Count and numbering invariants.
//!
//! `recompute` rewrites every derived field from the actual structure and is idempotent.
//! It runs after any structural change and before persistence. `check` reports drift
//! without mutating, and `validate_for_write` rejects trees missing required content.

use crate::error::ApiError;
use crate::tree::Roadmap;
use std::fmt;

pub const MAX_KEYWORDS: usize = 5;

/// Overwrite counts and positional numbering from the tree's actual shape.
///
/// `topicNumber` is a global ordinal across all phases; `phaseNumber` and
/// `infoBitNumber` are positions within their parent.
pub fn recompute(roadmap: &mut Roadmap) {
    let mut global_topic = 0u32;
    for (p, phase) in roadmap.phases.iter_mut().enumerate() {
        phase.phase_number = (p + 1) as u32;
        phase.topic_count = phase.topics.len() as u32;
        for topic in phase.topics.iter_mut() {
            global_topic += 1;
            topic.topic_number = global_topic;
            topic.infobit_count = topic.info_bits.len() as u32;
            for (b, info_bit) in topic.info_bits.iter_mut().enumerate() {
                info_bit.info_bit_number = (b + 1) as u32;
            }
        }
    }
    roadmap.phase_count = roadmap.phases.len() as u32;
    roadmap.total_lessons = roadmap.phases.iter().map(|p| p.topic_count).sum();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    PhaseCount { stored: u32, actual: u32 },
    TotalLessons { stored: u32, actual: u32 },
    TopicCount { phase: u32, stored: u32, actual: u32 },
    InfobitCount { topic: u32, stored: u32, actual: u32 },
    Numbering { at: String, stored: u32, expected: u32 },
    MissingQuiz { at: String },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::PhaseCount { stored, actual } => {
                write!(f, "phaseCount is {stored} but {actual} phases are present")
            }
            InvariantViolation::TotalLessons { stored, actual } => {
                write!(f, "totalLessons is {stored} but topic counts sum to {actual}")
            }
            InvariantViolation::TopicCount {
                phase,
                stored,
                actual,
            } => write!(
                f,
                "phase {phase}: topicCount is {stored} but {actual} topics are present"
            ),
            InvariantViolation::InfobitCount {
                topic,
                stored,
                actual,
            } => write!(
                f,
                "topic {topic}: infobitCount is {stored} but {actual} infobits are present"
            ),
            InvariantViolation::Numbering {
                at,
                stored,
                expected,
            } => write!(f, "{at}: number is {stored}, expected {expected}"),
            InvariantViolation::MissingQuiz { at } => write!(f, "{at}: infobit has no quiz"),
        }
    }
}

/// Report every place the stored counts or numbering disagree with the structure.
pub fn check(roadmap: &Roadmap) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let phases = roadmap.phases.len() as u32;
    if roadmap.phase_count != phases {
        violations.push(InvariantViolation::PhaseCount {
            stored: roadmap.phase_count,
            actual: phases,
        });
    }
    let lessons: u32 = roadmap.phases.iter().map(|p| p.topics.len() as u32).sum();
    if roadmap.total_lessons != lessons {
        violations.push(InvariantViolation::TotalLessons {
            stored: roadmap.total_lessons,
            actual: lessons,
        });
    }

    let mut global_topic = 0u32;
    for (p, phase) in roadmap.phases.iter().enumerate() {
        let expected_phase = (p + 1) as u32;
        if phase.phase_number != expected_phase {
            violations.push(InvariantViolation::Numbering {
                at: format!("phase {expected_phase}"),
                stored: phase.phase_number,
                expected: expected_phase,
            });
        }
        if phase.topic_count != phase.topics.len() as u32 {
            violations.push(InvariantViolation::TopicCount {
                phase: expected_phase,
                stored: phase.topic_count,
                actual: phase.topics.len() as u32,
            });
        }
        for topic in &phase.topics {
            global_topic += 1;
            if topic.topic_number != global_topic {
                violations.push(InvariantViolation::Numbering {
                    at: format!("topic {global_topic}"),
                    stored: topic.topic_number,
                    expected: global_topic,
                });
            }
            if topic.infobit_count != topic.info_bits.len() as u32 {
                violations.push(InvariantViolation::InfobitCount {
                    topic: global_topic,
                    stored: topic.infobit_count,
                    actual: topic.info_bits.len() as u32,
                });
            }
            for (b, info_bit) in topic.info_bits.iter().enumerate() {
                let expected_bit = (b + 1) as u32;
                if info_bit.info_bit_number != expected_bit {
                    violations.push(InvariantViolation::Numbering {
                        at: format!("topic {global_topic} infobit {expected_bit}"),
                        stored: info_bit.info_bit_number,
                        expected: expected_bit,
                    });
                }
                if info_bit.quiz.is_none() {
                    violations.push(InvariantViolation::MissingQuiz {
                        at: format!("topic {global_topic} infobit {expected_bit}"),
                    });
                }
            }
        }
    }
    violations
}

/// Reject trees that are missing content every stored record requires.
pub fn validate_for_write(roadmap: &Roadmap) -> Result<(), ApiError> {
    if roadmap.title.trim().is_empty() {
        return Err(ApiError::Validation("roadmap title is required".to_string()));
    }
    for (p, phase) in roadmap.phases.iter().enumerate() {
        let at_phase = format!("phase {}", p + 1);
        if phase.phase_description.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "{at_phase}: phaseDescription is required"
            )));
        }
        for (t, topic) in phase.topics.iter().enumerate() {
            let at_topic = format!("{at_phase} topic {}", t + 1);
            if topic.topic_name.trim().is_empty() {
                return Err(ApiError::Validation(format!(
                    "{at_topic}: topicName is required"
                )));
            }
            for (b, info_bit) in topic.info_bits.iter().enumerate() {
                let at_bit = format!("{at_topic} infobit {}", b + 1);
                if info_bit.text.trim().is_empty() {
                    return Err(ApiError::Validation(format!("{at_bit}: text is required")));
                }
                if info_bit.keywords.len() > MAX_KEYWORDS {
                    return Err(ApiError::Validation(format!(
                        "{at_bit}: at most {MAX_KEYWORDS} keywords allowed, got {}",
                        info_bit.keywords.len()
                    )));
                }
                let quiz = info_bit.quiz.as_ref().ok_or_else(|| {
                    ApiError::Validation(format!("{at_bit}: quiz is required"))
                })?;
                if quiz.text.trim().is_empty() {
                    return Err(ApiError::Validation(format!(
                        "{at_bit}: quiz text is required"
                    )));
                }
                if quiz.answer.is_none() {
                    return Err(ApiError::Validation(format!(
                        "{at_bit}: quiz answer is required"
                    )));
                }
            }
        }
    }
    Ok(())
}
