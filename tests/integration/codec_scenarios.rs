use crate::integration::support::{self, shaped};
use skillsprint::error::ApiError;
use skillsprint::progress::OverlayPatch;
use skillsprint::store::Table;
use skillsprint::tree::{Projection, SearchResult, WebResult};
use std::collections::BTreeMap;

#[test]
fn two_phase_save_then_delete_leaves_nothing_behind() {
    let (_dir, store, codec) = support::codec();
    let tree = shaped("Go", &[vec![1], vec![1]]);

    let roadmap_id = codec.save(&tree).unwrap();
    let loaded = codec.load(&roadmap_id).unwrap();
    assert_eq!(loaded.total_lessons, 2);
    assert_eq!(loaded.phase_count, 2);

    codec.delete(&roadmap_id).unwrap();
    assert!(matches!(codec.load(&roadmap_id), Err(ApiError::NotFound(_))));
    for table in [Table::Roadmaps, Table::Phases, Table::Topics, Table::InfoBits, Table::Quizzes] {
        assert_eq!(store.len(table), 0, "{table:?} still holds records");
    }
}

#[test]
fn round_trip_preserves_content_and_order() {
    let (_dir, _store, codec) = support::codec();
    let mut tree = shaped("Rust", &[vec![3, 11], vec![2], vec![1, 1, 1]]);
    tree.phases[0].topics[1].search_result = Some(SearchResult {
        web_results: vec![WebResult {
            title: "The Book".to_string(),
            url: "https://doc.rust-lang.org/book/".to_string(),
            description: "official".to_string(),
        }],
        video_results: Vec::new(),
    });

    let roadmap_id = codec.save(&tree).unwrap();
    let loaded = codec.load(&roadmap_id).unwrap();

    assert_eq!(loaded.id.as_deref(), Some(roadmap_id.as_str()));
    assert_eq!(loaded.phases.len(), 3);
    let texts: Vec<&str> = loaded.phases[0].topics[1]
        .info_bits
        .iter()
        .map(|b| b.text.as_str())
        .collect();
    let expected: Vec<String> = (0..11).map(|b| format!("fact 0.1.{b}")).collect();
    assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(loaded.phases[0].topics[1].search_result, tree.phases[0].topics[1].search_result);
    let numbers: Vec<u32> = loaded.topics().map(|t| t.topic_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    assert!(codec.verify(&roadmap_id).unwrap().is_empty());
}

#[test]
fn shrinking_update_prunes_orphans() {
    let (_dir, store, codec) = support::codec();
    let roadmap_id = codec.save(&shaped("Rust", &[vec![2, 2], vec![2]])).unwrap();
    assert_eq!(store.len(Table::InfoBits), 6);

    codec.update(&roadmap_id, &shaped("Rust 2e", &[vec![1]])).unwrap();
    let loaded = codec.load(&roadmap_id).unwrap();
    assert_eq!(loaded.title, "Rust 2e");
    assert_eq!(loaded.total_lessons, 1);
    assert_eq!(store.len(Table::Phases), 1);
    assert_eq!(store.len(Table::Topics), 1);
    assert_eq!(store.len(Table::InfoBits), 1);
    assert_eq!(store.len(Table::Quizzes), 1);
}

#[test]
fn quiz_without_answer_is_rejected() {
    let (_dir, store, codec) = support::codec();
    let mut tree = shaped("Rust", &[vec![1]]);
    if let Some(quiz) = tree.phases[0].topics[0].info_bits[0].quiz.as_mut() {
        quiz.answer = None;
    }
    assert!(matches!(codec.save(&tree), Err(ApiError::Validation(_))));
    assert_eq!(store.len(Table::Roadmaps), 0);
}

#[test]
fn listing_is_projected_and_capped() {
    let (_dir, _store, codec) = support::codec();
    for title in ["A", "B", "C"] {
        codec.save(&shaped(title, &[vec![1]])).unwrap();
    }
    let all = codec.list(&Projection::summary(), None).unwrap();
    assert_eq!(all.items.len(), 3);
    assert!(!all.truncated);

    let titles_only = codec.list(&Projection::fields(["title"]), Some(2)).unwrap();
    assert_eq!(titles_only.items.len(), 2);
    assert!(titles_only.truncated);
    assert!(titles_only.items.iter().all(|s| s.description.is_empty() && !s.id.is_empty()));
}

#[test]
fn shrinking_update_forgets_answers_on_removed_phase() {
    let (_dir, _store, codec) = support::codec();
    let roadmap_id = codec.save(&shaped("Rust", &[vec![1], vec![1]])).unwrap();
    let kept = format!("{roadmap_id}#PHASE#1#TOPIC#1#INFOBIT#1");
    let dropped = format!("{roadmap_id}#PHASE#2#TOPIC#1#INFOBIT#1");
    codec
        .upsert_progress(
            "learner",
            &roadmap_id,
            &OverlayPatch {
                quiz_answers: Some(BTreeMap::from([
                    (kept.clone(), "a".to_string()),
                    (dropped.clone(), "b".to_string()),
                ])),
                ..OverlayPatch::default()
            },
        )
        .unwrap();

    codec.update(&roadmap_id, &shaped("Rust", &[vec![1]])).unwrap();

    let overlay = codec.overlays().get("learner", &roadmap_id).unwrap().unwrap();
    assert_eq!(overlay.quiz_answers.keys().collect::<Vec<_>>(), vec![&kept]);
    let view = codec.load_for_user("learner", &roadmap_id).unwrap();
    assert_eq!(view.roadmap.info_bits().count(), 1);
}
