use crate::integration::support::{self, shaped};
use serde_json::json;
use skillsprint::api::{ApiRequest, Method, Router};
use std::sync::Arc;

fn router() -> (tempfile::TempDir, Router) {
    let (dir, _store, codec) = support::codec();
    (dir, Router::new(Arc::new(codec)))
}

#[test]
fn every_response_carries_cors_headers() {
    let (_dir, router) = router();
    let requests = [
        ApiRequest::new(Method::Options, "/roadmap/x"),
        ApiRequest::new(Method::Get, "/roadmap/missing"),
        ApiRequest::new(Method::Get, "/nowhere"),
        ApiRequest::new(Method::Get, "/allRoadmap"),
    ];
    for request in &requests {
        let response = router.handle(request);
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Access-Control-Allow-Headers"], "*");
        assert_eq!(
            response.headers["Access-Control-Allow-Methods"],
            "OPTIONS,POST,GET,DELETE"
        );
    }
}

#[test]
fn status_codes_follow_error_kind() {
    let (_dir, router) = router();
    let status = |method, path: &str| router.handle(&ApiRequest::new(method, path)).status;

    assert_eq!(status(Method::Get, "/unknown/route"), 404);
    assert_eq!(status(Method::Get, "/roadmap/absent"), 404);
    assert_eq!(status(Method::Get, "/roadmap/"), 400);
    assert_eq!(status(Method::Get, "/userRoadmap/u1"), 400);
    assert_eq!(status(Method::Delete, "/allRoadmap"), 405);
    assert_eq!(status(Method::Post, "/allUserRoadmaps/u1"), 405);
    assert_eq!(status(Method::Options, "/allRoadmap"), 200);
    assert_eq!(status(Method::Get, "/allRoadmap?limit=many"), 400);
}

#[test]
fn learner_flow_through_routes() {
    let (_dir, router) = router();
    let body = serde_json::to_value(shaped("Rust", &[vec![1, 1]])).unwrap();

    let created = router.handle(&ApiRequest::new(Method::Post, "/allRoadmap").with_body(body));
    assert_eq!(created.status, 201);
    let roadmap_id = created.body["roadmapId"].as_str().unwrap().to_string();

    let bit = format!("{roadmap_id}#PHASE#1#TOPIC#2#INFOBIT#1");
    let mut answers = serde_json::Map::new();
    answers.insert(bit, json!("ownership"));
    let patched = router.handle(
        &ApiRequest::new(Method::Post, format!("/userRoadmap/learner/{roadmap_id}"))
            .with_body(json!({ "status": "ongoing", "quizAnswers": answers })),
    );
    assert!(patched.is_success(), "{:?}", patched.body);

    let view = router.handle(&ApiRequest::new(
        Method::Get,
        format!("/userRoadmap/learner/{roadmap_id}"),
    ));
    assert_eq!(view.status, 200);
    let topics = &view.body["phases"][0]["topics"];
    assert_eq!(topics[0]["infoBits"][0]["userAnswer"], "");
    assert_eq!(topics[1]["infoBits"][0]["userAnswer"], "ownership");

    let listing = router.handle(&ApiRequest::new(Method::Get, "/allUserRoadmaps/learner"));
    assert_eq!(listing.body.as_array().map(Vec::len), Some(1));

    let deleted = router.handle(&ApiRequest::new(Method::Delete, format!("/roadmap/{roadmap_id}")));
    assert_eq!(deleted.status, 200);
    let again = router.handle(&ApiRequest::new(Method::Delete, format!("/roadmap/{roadmap_id}")));
    assert_eq!(again.status, 404);
}

#[test]
fn foreign_answer_keys_are_rejected() {
    let (_dir, router) = router();
    let body = serde_json::to_value(shaped("Rust", &[vec![1]])).unwrap();
    let created = router.handle(&ApiRequest::new(Method::Post, "/allRoadmap").with_body(body));
    let roadmap_id = created.body["roadmapId"].as_str().unwrap().to_string();

    let response = router.handle(
        &ApiRequest::new(Method::Post, format!("/userRoadmap/u/{roadmap_id}"))
            .with_body(json!({ "quizAnswers": { "other#PHASE#1#TOPIC#1#INFOBIT#1": "x" } })),
    );
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "validation");
}

#[test]
fn progress_for_missing_infobit_or_roadmap_is_not_stored() {
    let (_dir, router) = router();
    let body = serde_json::to_value(shaped("Rust", &[vec![1], vec![1]])).unwrap();
    let created = router.handle(&ApiRequest::new(Method::Post, "/allRoadmap").with_body(body));
    let roadmap_id = created.body["roadmapId"].as_str().unwrap().to_string();

    let mut answers = serde_json::Map::new();
    answers.insert(format!("{roadmap_id}#PHASE#99#TOPIC#1#INFOBIT#1"), json!("x"));
    let stray = router.handle(
        &ApiRequest::new(Method::Post, format!("/userRoadmap/u/{roadmap_id}"))
            .with_body(json!({ "quizAnswers": answers })),
    );
    assert_eq!(stray.status, 400);

    let missing = router.handle(
        &ApiRequest::new(Method::Post, "/userRoadmap/u/no-such-roadmap")
            .with_body(json!({ "status": "ongoing" })),
    );
    assert_eq!(missing.status, 404);

    let view = router.handle(&ApiRequest::new(
        Method::Get,
        format!("/userRoadmap/u/{roadmap_id}"),
    ));
    assert_eq!(view.status, 404);
}
