//! Task Dispatcher
//!
//! Hands a job payload to a fresh instance of a named job and waits for its reply.
//! Replies cross the boundary as a [`JobReply`] envelope so a failure keeps its
//! kind (and, for exhaustion, its partial tree) on the caller's side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::tree::Roadmap;

/// A job that can be started by name.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, payload: Value) -> Result<Value, ApiError>;
}

#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Run `job_name` with `payload` and return its result. Not retried.
    async fn dispatch(&self, job_name: &str, payload: Value) -> Result<Value, ApiError>;
}

/// Serialized form of an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hops: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<Box<Roadmap>>,
}

impl From<ApiError> for JobError {
    fn from(err: ApiError) -> Self {
        let kind = err.kind().to_string();
        let mut out = JobError {
            kind,
            message: String::new(),
            excerpt: None,
            hops: None,
            partial: None,
        };
        match err {
            ApiError::Validation(m)
            | ApiError::NotFound(m)
            | ApiError::RateLimited(m)
            | ApiError::Upstream(m)
            | ApiError::ConfigError(m) => out.message = m,
            ApiError::Exhausted { hops, partial } => {
                out.message = format!("continuation exhausted after {hops} hops");
                out.hops = Some(hops);
                out.partial = Some(partial);
            }
            ApiError::RepairFailure { message, excerpt } => {
                out.message = message;
                out.excerpt = Some(excerpt);
            }
            other @ ApiError::StorageError(_) => out.message = other.to_string(),
        }
        out
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err.kind.as_str() {
            "validation" => ApiError::Validation(err.message),
            "not_found" => ApiError::NotFound(err.message),
            "rate_limited" => ApiError::RateLimited(err.message),
            "exhausted" => match err.partial {
                Some(partial) => ApiError::Exhausted {
                    hops: err.hops.unwrap_or_default(),
                    partial,
                },
                None => ApiError::Upstream(err.message),
            },
            "repair_failure" => ApiError::RepairFailure {
                message: err.message,
                excerpt: err.excerpt.unwrap_or_default(),
            },
            "config" => ApiError::ConfigError(err.message),
            _ => ApiError::Upstream(err.message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobReply {
    Ok(Value),
    Error(JobError),
}

impl From<Result<Value, ApiError>> for JobReply {
    fn from(result: Result<Value, ApiError>) -> Self {
        match result {
            Ok(value) => JobReply::Ok(value),
            Err(err) => JobReply::Error(err.into()),
        }
    }
}

impl JobReply {
    pub fn into_result(self) -> Result<Value, ApiError> {
        match self {
            JobReply::Ok(value) => Ok(value),
            JobReply::Error(err) => Err(err.into()),
        }
    }
}

/// Runs each dispatched job on its own tokio task inside this process.
///
/// Handlers are held weakly so a handler that owns this dispatcher does not leak.
#[derive(Default)]
pub struct InProcessDispatcher {
    handlers: RwLock<HashMap<String, Weak<dyn JobHandler>>>,
    dispatched: AtomicUsize,
}

impl InProcessDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: JobHandler + 'static>(&self, job_name: &str, handler: &Arc<H>) {
        let weak: Weak<dyn JobHandler> = Arc::downgrade(handler) as Weak<dyn JobHandler>;
        self.handlers.write().insert(job_name.to_string(), weak);
    }

    /// Number of dispatches accepted so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskDispatcher for InProcessDispatcher {
    async fn dispatch(&self, job_name: &str, payload: Value) -> Result<Value, ApiError> {
        let handler = self
            .handlers
            .read()
            .get(job_name)
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| ApiError::Upstream(format!("no handler registered for job {job_name}")))?;
        let seq = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(job_name, seq, "Dispatching job");

        let task = tokio::spawn(async move { JobReply::from(handler.run(payload).await) });
        match task.await {
            Ok(reply) => reply.into_result(),
            Err(e) => {
                error!(job_name, error = %e, "Dispatched job panicked or was cancelled");
                Err(ApiError::Upstream(format!("job {job_name} did not complete: {e}")))
            }
        }
    }
}

const DISPATCH_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches by POSTing the payload to `{base_url}/jobs/{job_name}`.
pub struct HttpTaskDispatcher {
    client: Client,
    base_url: String,
}

impl HttpTaskDispatcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(DISPATCH_HTTP_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create dispatch client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn job_url(&self, job_name: &str) -> String {
        format!("{}/jobs/{}", self.base_url, job_name)
    }
}

#[async_trait]
impl TaskDispatcher for HttpTaskDispatcher {
    async fn dispatch(&self, job_name: &str, payload: Value) -> Result<Value, ApiError> {
        let url = self.job_url(job_name);
        debug!(job_name, url = %url, "Dispatching job over HTTP");
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("dispatch to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Upstream(format!(
                "dispatch to {url} failed with status {status}: {body}"
            )));
        }
        let reply: JobReply = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to parse job reply: {e}")))?;
        reply.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        async fn run(&self, payload: Value) -> Result<Value, ApiError> {
            if payload.get("fail").is_some() {
                return Err(ApiError::RateLimited("slow down".to_string()));
            }
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let dispatcher = InProcessDispatcher::new();
        let echo = Arc::new(Echo);
        dispatcher.register("echo", &echo);

        let out = dispatcher.dispatch("echo", json!({"n": 1})).await.unwrap();
        assert_eq!(out, json!({"n": 1}));

        let err = dispatcher
            .dispatch("echo", json!({"fail": true}))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(dispatcher.dispatched(), 2);
    }

    #[tokio::test]
    async fn unknown_or_dropped_handler_is_upstream_failure() {
        let dispatcher = InProcessDispatcher::new();
        let err = dispatcher.dispatch("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));

        let echo = Arc::new(Echo);
        dispatcher.register("echo", &echo);
        drop(echo);
        let err = dispatcher.dispatch("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[test]
    fn exhausted_keeps_partial_tree_across_envelope() {
        let partial = crate::tree::fixtures::shaped(&[&[1]]);
        let reply = JobReply::from(Err(ApiError::Exhausted {
            hops: 15,
            partial: Box::new(partial.clone()),
        }));
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire["error"]["kind"], "exhausted");
        let back: JobReply = serde_json::from_value(wire).unwrap();
        match back.into_result() {
            Err(ApiError::Exhausted { hops, partial: p }) => {
                assert_eq!(hops, 15);
                assert_eq!(*p, partial);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn job_url_joins_base_and_name() {
        let d = HttpTaskDispatcher::new("http://localhost:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(d.job_url("enrich-roadmap"), "http://localhost:9000/jobs/enrich-roadmap");
    }
}
