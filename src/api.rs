//! Request Router
//!
//! HTTP-shaped front for the codec and the overlay store. Requests and responses are
//! plain values so any server (or the CLI) can carry them; every response, errors
//! included, carries permissive CORS headers.

use crate::error::ApiError;
use crate::progress::OverlayPatch;
use crate::tree::{Projection, Roadmap, RoadmapCodec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
    Options,
}

impl FromStr for Method {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            other => Err(ApiError::Validation(format!("unsupported method {other}"))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: Method,
    /// Path with an optional query string, e.g. `/allRoadmap?limit=10`.
    pub path: String,
    #[serde(default)]
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl ApiResponse {
    fn new(status: u16, body: Value) -> Self {
        let headers = [
            ("Access-Control-Allow-Headers", "*"),
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "OPTIONS,POST,GET,DELETE"),
            ("Content-Type", "application/json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    fn error(status: u16, kind: &str, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": kind, "message": message.into() }))
    }

    fn from_error(err: &ApiError) -> Self {
        Self::error(err.status_code(), err.kind(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Known routes. Path parameters are `None` when the segment is missing or empty.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    AllRoadmaps,
    Roadmap(Option<&'a str>),
    AllUserRoadmaps(Option<&'a str>),
    UserRoadmap(Option<&'a str>, Option<&'a str>),
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let mut segments = path.trim_matches('/').split('/');
        let head = segments.next()?;
        let mut param = || segments.next().filter(|s| !s.is_empty());
        let route = match head {
            "allRoadmap" => Route::AllRoadmaps,
            "roadmap" => Route::Roadmap(param()),
            "allUserRoadmaps" => Route::AllUserRoadmaps(param()),
            "userRoadmap" => {
                let user = param();
                Route::UserRoadmap(user, param())
            }
            _ => return None,
        };
        Some(route)
    }

    fn allows(&self, method: Method) -> bool {
        match self {
            Route::AllRoadmaps => matches!(method, Method::Get | Method::Post),
            Route::Roadmap(_) | Route::UserRoadmap(..) => {
                matches!(method, Method::Get | Method::Post | Method::Delete)
            }
            Route::AllUserRoadmaps(_) => method == Method::Get,
        }
    }
}

fn split_query(path: &str) -> (&str, BTreeMap<&str, &str>) {
    match path.split_once('?') {
        Some((path, query)) => {
            let params = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .collect();
            (path, params)
        }
        None => (path, BTreeMap::new()),
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    value.ok_or_else(|| ApiError::Validation(format!("missing path parameter {name}")))
}

fn body_of(request: &ApiRequest) -> Result<&Value, ApiError> {
    request
        .body
        .as_ref()
        .ok_or_else(|| ApiError::Validation("request body is required".to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::StorageError(e.into()))
}

pub struct Router {
    codec: Arc<RoadmapCodec>,
}

impl Router {
    pub fn new(codec: Arc<RoadmapCodec>) -> Self {
        Self { codec }
    }

    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let (path, query) = split_query(&request.path);
        let Some(route) = Route::parse(path) else {
            debug!(path, "No route");
            return ApiResponse::error(404, "not_found", format!("no route for {path}"));
        };
        if request.method == Method::Options {
            return ApiResponse::ok(Value::Null);
        }
        if !route.allows(request.method) {
            return ApiResponse::error(
                405,
                "method_not_allowed",
                format!("{} is not supported on {path}", request.method),
            );
        }

        match self.dispatch(request, route, &query) {
            Ok(response) => {
                info!(method = %request.method, path, status = response.status, "Request handled");
                response
            }
            Err(err) => {
                let response = ApiResponse::from_error(&err);
                if response.status >= 500 {
                    error!(method = %request.method, path, error = %err, "Request failed");
                } else {
                    debug!(method = %request.method, path, error = %err, "Request rejected");
                }
                response
            }
        }
    }

    fn dispatch(
        &self,
        request: &ApiRequest,
        route: Route<'_>,
        query: &BTreeMap<&str, &str>,
    ) -> Result<ApiResponse, ApiError> {
        match (request.method, route) {
            (Method::Get, Route::AllRoadmaps) => {
                let limit = match query.get("limit") {
                    Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                        ApiError::Validation(format!("limit must be a number, got {raw:?}"))
                    })?),
                    None => None,
                };
                let listing = self.codec.list(&Projection::summary(), limit)?;
                Ok(ApiResponse::ok(to_json(&listing)?))
            }
            (Method::Post, Route::AllRoadmaps) => {
                let tree = parse_tree(body_of(request)?)?;
                let roadmap_id = self.codec.save(&tree)?;
                Ok(ApiResponse::new(201, json!({ "roadmapId": roadmap_id })))
            }
            (Method::Get, Route::Roadmap(id)) => {
                let tree = self.codec.load(required(id, "roadmapId")?)?;
                Ok(ApiResponse::ok(to_json(&tree)?))
            }
            (Method::Post, Route::Roadmap(id)) => {
                let roadmap_id = required(id, "roadmapId")?;
                let tree = parse_tree(body_of(request)?)?;
                self.codec.update(roadmap_id, &tree)?;
                Ok(ApiResponse::ok(json!({ "roadmapId": roadmap_id })))
            }
            (Method::Delete, Route::Roadmap(id)) => {
                let roadmap_id = required(id, "roadmapId")?;
                self.codec.delete(roadmap_id)?;
                Ok(ApiResponse::ok(json!({ "deleted": roadmap_id })))
            }
            (Method::Get, Route::AllUserRoadmaps(user)) => {
                let summaries = self.codec.list_for_user(required(user, "userId")?)?;
                Ok(ApiResponse::ok(to_json(&summaries)?))
            }
            (Method::Get, Route::UserRoadmap(user, roadmap)) => {
                let view = self
                    .codec
                    .load_for_user(required(user, "userId")?, required(roadmap, "roadmapId")?)?;
                Ok(ApiResponse::ok(to_json(&view)?))
            }
            (Method::Post, Route::UserRoadmap(user, roadmap)) => {
                let user_id = required(user, "userId")?;
                let roadmap_id = required(roadmap, "roadmapId")?;
                let patch = parse_patch(body_of(request)?)?;
                let overlay = self.codec.upsert_progress(user_id, roadmap_id, &patch)?;
                Ok(ApiResponse::ok(to_json(&overlay)?))
            }
            (Method::Delete, Route::UserRoadmap(user, roadmap)) => {
                let user_id = required(user, "userId")?;
                let roadmap_id = required(roadmap, "roadmapId")?;
                self.codec.overlays().delete(user_id, roadmap_id)?;
                Ok(ApiResponse::ok(json!({ "deleted": roadmap_id, "userId": user_id })))
            }
            (method, route) => Err(ApiError::Validation(format!(
                "{method} is not routable for {route:?}"
            ))),
        }
    }
}

fn parse_tree(body: &Value) -> Result<Roadmap, ApiError> {
    serde_json::from_value(body.clone())
        .map_err(|e| ApiError::Validation(format!("invalid roadmap document: {e}")))
}

/// Accepts either a flat patch or a nested document with `userAnswer` per infobit.
fn parse_patch(body: &Value) -> Result<OverlayPatch, ApiError> {
    let mut patch: OverlayPatch = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::Validation(format!("invalid progress update: {e}")))?;
    if body.get("phases").is_some() {
        let tree = parse_tree(body)?;
        let answered = OverlayPatch::from_answered_tree(&tree);
        let answers = patch.quiz_answers.get_or_insert_with(BTreeMap::new);
        answers.extend(answered.quiz_answers.unwrap_or_default());
    }
    Ok(patch)
}
