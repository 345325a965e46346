//! Property-based tests for tree shape, counts and persistence

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use skillsprint::store::SledRecordStore;
use skillsprint::tree::invariants;
use skillsprint::tree::{InfoBit, Phase, Quiz, QuizType, Roadmap, RoadmapCodec, Topic};
use std::sync::Arc;
use tempfile::TempDir;

/// Infobit texts per topic, topics per phase.
type Shape = Vec<Vec<Vec<String>>>;

fn shape_strategy() -> impl Strategy<Value = Shape> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec("[a-z][a-z ]{0,15}", 1..4), 1..4),
        1..4,
    )
}

fn build(shape: &Shape, scramble: u32) -> Roadmap {
    let phases = shape
        .iter()
        .enumerate()
        .map(|(p, topics)| Phase {
            id: None,
            phase_number: scramble,
            phase_description: format!("phase {p}"),
            topic_count: scramble,
            topics: topics
                .iter()
                .enumerate()
                .map(|(t, bits)| Topic {
                    id: None,
                    topic_number: scramble,
                    topic_name: format!("topic {p}.{t}"),
                    topic_search_term: None,
                    topic_outline: Vec::new(),
                    search_result: None,
                    infobit_count: scramble,
                    info_bits: bits
                        .iter()
                        .map(|text| InfoBit {
                            id: None,
                            info_bit_number: scramble,
                            text: text.clone(),
                            keywords: vec![text.clone()],
                            example: None,
                            quiz: Some(Quiz {
                                text: format!("What about {text}?"),
                                quiz_type: QuizType::ShortAnswer,
                                options: Vec::new(),
                                answer: Some(text.clone()),
                            }),
                            user_answer: None,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    Roadmap {
        id: None,
        title: "Property".to_string(),
        description: String::new(),
        image_url: String::new(),
        skill_name: "Property".to_string(),
        goal: String::new(),
        estimated_learning_duration: String::new(),
        daily_time: String::new(),
        current_skill_level: String::new(),
        desired_skill_level: String::new(),
        phase_count: scramble,
        total_lessons: scramble,
        phases,
    }
}

/// Recompute is idempotent and leaves nothing for `check` to report
#[test]
fn test_recompute_is_idempotent_property() {
    let mut runner = TestRunner::default();

    runner
        .run(&(shape_strategy(), 0u32..50), |(shape, scramble)| {
            let mut once = build(&shape, scramble);
            invariants::recompute(&mut once);
            let mut twice = once.clone();
            invariants::recompute(&mut twice);

            prop_assert_eq!(&once, &twice);
            prop_assert!(invariants::check(&once).is_empty());

            let topics: usize = shape.iter().map(Vec::len).sum();
            prop_assert_eq!(once.phase_count as usize, shape.len());
            prop_assert_eq!(once.total_lessons as usize, topics);
            let numbers: Vec<u32> = once.topics().map(|t| t.topic_number).collect();
            prop_assert_eq!(numbers, (1..=topics as u32).collect::<Vec<_>>());
            Ok(())
        })
        .unwrap();
}

/// Loading a saved tree gives back the same content in the same order
#[test]
fn test_save_load_preserves_content_property() {
    let mut runner = TestRunner::new(Config::with_cases(24));

    runner
        .run(&shape_strategy(), |shape| {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(SledRecordStore::new(dir.path().join("store")).unwrap());
            let codec = RoadmapCodec::new(store);

            let tree = build(&shape, 0);
            let roadmap_id = codec.save(&tree).unwrap();
            let loaded = codec.load(&roadmap_id).unwrap();

            let loaded_shape: Shape = loaded
                .phases
                .iter()
                .map(|p| {
                    p.topics
                        .iter()
                        .map(|t| t.info_bits.iter().map(|b| b.text.clone()).collect())
                        .collect()
                })
                .collect();
            prop_assert_eq!(loaded_shape, shape);
            prop_assert!(invariants::check(&loaded).is_empty());
            prop_assert!(loaded.info_bits().all(|b| b.quiz.is_some() && b.id.is_some()));
            Ok(())
        })
        .unwrap();
}
