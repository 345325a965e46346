//! Shared builders for integration tests.

use skillsprint::store::SledRecordStore;
use skillsprint::tree::{InfoBit, Phase, Quiz, QuizType, Roadmap, RoadmapCodec, Topic};
use std::sync::Arc;
use tempfile::TempDir;

/// A codec over a fresh sled store; keep the `TempDir` alive for the test's duration.
pub fn codec() -> (TempDir, Arc<SledRecordStore>, RoadmapCodec) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledRecordStore::new(dir.path().join("store")).unwrap());
    let codec = RoadmapCodec::new(store.clone());
    (dir, store, codec)
}

pub fn info_bit(text: &str) -> InfoBit {
    InfoBit {
        id: None,
        info_bit_number: 0,
        text: text.to_string(),
        keywords: vec![text.split_whitespace().next().unwrap_or(text).to_string()],
        example: None,
        quiz: Some(Quiz {
            text: format!("Explain: {text}"),
            quiz_type: QuizType::ShortAnswer,
            options: Vec::new(),
            answer: Some(text.to_string()),
        }),
        user_answer: None,
    }
}

pub fn topic(name: &str, info_bits: Vec<InfoBit>) -> Topic {
    Topic {
        id: None,
        topic_number: 0,
        topic_name: name.to_string(),
        topic_search_term: None,
        topic_outline: vec![format!("{name} basics")],
        search_result: None,
        infobit_count: 0,
        info_bits,
    }
}

pub fn phase(description: &str, topics: Vec<Topic>) -> Phase {
    Phase {
        id: None,
        phase_number: 0,
        phase_description: description.to_string(),
        topic_count: 0,
        topics,
    }
}

pub fn roadmap(title: &str, phases: Vec<Phase>) -> Roadmap {
    Roadmap {
        id: None,
        title: title.to_string(),
        description: format!("Learn {title}"),
        image_url: String::new(),
        skill_name: title.to_string(),
        goal: "Build something real".to_string(),
        estimated_learning_duration: "4 weeks".to_string(),
        daily_time: "1 hour".to_string(),
        current_skill_level: "beginner".to_string(),
        desired_skill_level: "intermediate".to_string(),
        phase_count: 0,
        total_lessons: 0,
        phases,
    }
}

/// `shape[p][t]` infobits in topic t of phase p.
pub fn shaped(title: &str, shape: &[Vec<usize>]) -> Roadmap {
    let phases = shape
        .iter()
        .enumerate()
        .map(|(p, topics)| {
            let topics = topics
                .iter()
                .enumerate()
                .map(|(t, &bits)| {
                    let info_bits = (0..bits)
                        .map(|b| info_bit(&format!("fact {p}.{t}.{b}")))
                        .collect();
                    topic(&format!("{title} topic {p}.{t}"), info_bits)
                })
                .collect();
            phase(&format!("{title} phase {p}"), topics)
        })
        .collect();
    roadmap(title, phases)
}
