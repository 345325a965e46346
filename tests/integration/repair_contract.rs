use serde_json::json;
use skillsprint::error::ApiError;
use skillsprint::generator::repair::repair_json;

#[test]
fn missing_comma_is_repaired() {
    assert_eq!(repair_json(r#"{"a":1 "b":2}"#).unwrap(), json!({"a": 1, "b": 2}));
}

#[test]
fn fenced_output_is_unwrapped() {
    let raw = "```json\n{\"phases\": [{\"phaseDescription\": \"Intro\" \"topics\": []}]}\n```";
    assert_eq!(
        repair_json(raw).unwrap(),
        json!({"phases": [{"phaseDescription": "Intro", "topics": []}]})
    );
}

#[test]
fn garbage_is_a_repair_failure() {
    for raw in ["", "no json here", "{ definitely not json }", "{\"a\": [1, 2}"] {
        assert!(
            matches!(repair_json(raw), Err(ApiError::RepairFailure { .. })),
            "{raw:?}"
        );
    }
}
