use crate::integration::support::{self, shaped};
use skillsprint::error::ApiError;
use skillsprint::progress::{OverlayPatch, ProgressStatus};
use std::collections::BTreeMap;

#[test]
fn answered_infobit_shows_answer_and_others_show_empty() {
    let (_dir, _store, codec) = support::codec();
    let roadmap_id = codec.save(&shaped("Rust", &[vec![2, 1], vec![1]])).unwrap();
    let first = format!("{roadmap_id}#PHASE#1#TOPIC#1#INFOBIT#1");

    codec
        .upsert_progress(
            "userA",
            &roadmap_id,
            &OverlayPatch {
                status: Some(ProgressStatus::Ongoing),
                quiz_answers: Some(BTreeMap::from([(first.clone(), "x".to_string())])),
                ..OverlayPatch::default()
            },
        )
        .unwrap();

    let view = codec.load_for_user("userA", &roadmap_id).unwrap();
    assert_eq!(view.status, ProgressStatus::Ongoing);
    for bit in view.roadmap.info_bits() {
        let expected = if bit.id.as_deref() == Some(first.as_str()) { "x" } else { "" };
        assert_eq!(bit.user_answer.as_deref(), Some(expected));
    }
}

#[test]
fn partial_updates_keep_untouched_fields() {
    let (_dir, _store, codec) = support::codec();
    let roadmap_id = codec.save(&shaped("Rust", &[vec![1, 1]])).unwrap();
    let bit = |t: usize| format!("{roadmap_id}#PHASE#1#TOPIC#{t}#INFOBIT#1");

    codec
        .upsert_progress(
            "u",
            &roadmap_id,
            &OverlayPatch {
                current_lesson: Some(2),
                quiz_answers: Some(BTreeMap::from([(bit(1), "a".to_string())])),
                ..OverlayPatch::default()
            },
        )
        .unwrap();
    let overlay = codec
        .upsert_progress(
            "u",
            &roadmap_id,
            &OverlayPatch {
                status: Some(ProgressStatus::Completed),
                quiz_answers: Some(BTreeMap::from([(bit(2), "".to_string())])),
                ..OverlayPatch::default()
            },
        )
        .unwrap();

    assert_eq!(overlay.status, ProgressStatus::Completed);
    assert_eq!(overlay.current_lesson, 2);
    assert_eq!(overlay.quiz_answers.len(), 2);
    // an empty answer is still an answer
    assert_eq!(overlay.quiz_answers.get(&bit(2)).map(String::as_str), Some(""));
}

#[test]
fn missing_overlay_is_not_found_for_user_view() {
    let (_dir, _store, codec) = support::codec();
    let roadmap_id = codec.save(&shaped("Rust", &[vec![1]])).unwrap();
    assert!(matches!(
        codec.load_for_user("nobody", &roadmap_id),
        Err(ApiError::NotFound(_))
    ));
    codec.overlays().delete("nobody", &roadmap_id).unwrap();
}

#[test]
fn deleted_roadmap_leaves_no_progress_behind() {
    let (_dir, _store, codec) = support::codec();
    let kept = codec.save(&shaped("Kept", &[vec![1]])).unwrap();
    let gone = codec.save(&shaped("Gone", &[vec![1]])).unwrap();
    for id in [&kept, &gone] {
        codec.upsert_progress("u", id, &OverlayPatch::default()).unwrap();
    }
    codec.delete(&gone).unwrap();

    let listing = codec.list_for_user("u").unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].id, kept);
    assert_eq!(listing[0].status, Some(ProgressStatus::Ongoing));
    assert!(codec.overlays().get("u", &gone).unwrap().is_none());
}

#[test]
fn answers_must_name_stored_infobits() {
    let (_dir, _store, codec) = support::codec();
    let roadmap_id = codec.save(&shaped("Rust", &[vec![1], vec![1]])).unwrap();
    let patch = |key: String| OverlayPatch {
        quiz_answers: Some(BTreeMap::from([(key, "x".to_string())])),
        ..OverlayPatch::default()
    };

    let stray = format!("{roadmap_id}#PHASE#99#TOPIC#1#INFOBIT#1");
    assert!(matches!(
        codec.upsert_progress("u", &roadmap_id, &patch(stray)),
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        codec.upsert_progress("u", "missing", &OverlayPatch::default()),
        Err(ApiError::NotFound(_))
    ));
    assert!(codec.overlays().get("u", &roadmap_id).unwrap().is_none());
}
