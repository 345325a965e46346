//! Continuation Scheduler
//!
//! Enriches every topic of a roadmap with search results. A single hop walks the
//! topics in document order, skipping any that already carry a result, and stops at
//! the first rate limit (or when its time budget runs out). The partially enriched
//! tree travels to the next hop inside the job payload, so hops keep no state of
//! their own and re-running one is harmless. The chain ends after `max_hops` hops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::dispatch::{JobHandler, TaskDispatcher};
use crate::error::{ApiError, StorageError};
use crate::search::ResourceSearch;
use crate::tree::Roadmap;

/// Payload handed from one hop to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationState {
    pub tree: Roadmap,
    /// 1-based ordinal of the hop that will process this state.
    pub hop_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    RateLimited,
    BudgetElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HopOutcome {
    Complete(Roadmap),
    Incomplete { tree: Roadmap, reason: StopReason },
}

pub struct ContinuationScheduler {
    search: Arc<dyn ResourceSearch>,
    dispatcher: Arc<dyn TaskDispatcher>,
    config: SchedulerConfig,
}

impl ContinuationScheduler {
    pub fn new(
        search: Arc<dyn ResourceSearch>,
        dispatcher: Arc<dyn TaskDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            search,
            dispatcher,
            config,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.config.job_name
    }

    /// One enrichment pass over the tree.
    pub async fn hop(&self, mut tree: Roadmap) -> Result<HopOutcome, ApiError> {
        let started = Instant::now();
        let budget = self.config.hop_budget_ms.map(Duration::from_millis);
        let deadline = self.config.search_timeout_ms.map(Duration::from_millis);
        let title = tree.title.clone();
        let mut searched = 0usize;
        let mut stop = None;

        'walk: for phase in tree.phases.iter_mut() {
            for topic in phase.topics.iter_mut() {
                if topic.is_enriched() {
                    continue;
                }
                // the first pending topic is always attempted, so every hop progresses
                if searched > 0 && budget.is_some_and(|b| started.elapsed() >= b) {
                    info!(searched, "Hop budget elapsed");
                    stop = Some(StopReason::BudgetElapsed);
                    break 'walk;
                }

                let term = topic.search_term(&title);
                let call = self.search.search(&term);
                let result = match deadline {
                    Some(limit) => match tokio::time::timeout(limit, call).await {
                        Ok(result) => result,
                        Err(_) => Err(ApiError::Upstream(format!(
                            "search for {term:?} exceeded {}ms",
                            limit.as_millis()
                        ))),
                    },
                    None => call.await,
                };
                searched += 1;

                match result {
                    Ok(found) => {
                        debug!(
                            topic = %topic.topic_name,
                            web = found.web_results.len(),
                            video = found.video_results.len(),
                            "Topic enriched"
                        );
                        topic.search_result = Some(found);
                    }
                    Err(e) if e.is_rate_limited() => {
                        warn!(topic = %topic.topic_name, error = %e, "Search rate limited, yielding hop");
                        stop = Some(StopReason::RateLimited);
                        break 'walk;
                    }
                    Err(e) => {
                        error!(topic = %topic.topic_name, error = %e, "Search failed");
                        return Err(e);
                    }
                }
            }
        }

        if let Some(reason) = stop {
            return Ok(HopOutcome::Incomplete { tree, reason });
        }
        debug!(searched, "Hop complete");
        Ok(HopOutcome::Complete(tree))
    }

    /// Run one hop and, if it did not finish, relay the rest through the dispatcher.
    pub async fn handle(&self, state: ContinuationState) -> Result<Roadmap, ApiError> {
        let ContinuationState { tree, hop_index } = state;
        info!(
            hop_index,
            enriched = tree.enriched_topic_count(),
            topics = tree.topics().count(),
            "Starting enrichment hop"
        );
        match self.hop(tree).await? {
            HopOutcome::Complete(tree) => {
                info!(hop_index, "Enrichment complete");
                Ok(tree)
            }
            HopOutcome::Incomplete { tree, reason } => {
                if hop_index >= self.config.max_hops {
                    error!(hop_index, ?reason, "Continuation hop bound reached");
                    return Err(ApiError::Exhausted {
                        hops: hop_index,
                        partial: Box::new(tree),
                    });
                }
                let next = ContinuationState {
                    tree,
                    hop_index: hop_index + 1,
                };
                debug!(next_hop = next.hop_index, ?reason, "Dispatching continuation");
                let payload = serde_json::to_value(&next).map_err(StorageError::from)?;
                let reply = self
                    .dispatcher
                    .dispatch(&self.config.job_name, payload)
                    .await?;
                let tree = serde_json::from_value(reply).map_err(|e| {
                    ApiError::Upstream(format!("continuation returned an invalid tree: {e}"))
                })?;
                Ok(tree)
            }
        }
    }

    /// Entry point: enrich `tree` starting at the configured first hop.
    pub async fn enrich(&self, tree: Roadmap) -> Result<Roadmap, ApiError> {
        self.handle(ContinuationState {
            tree,
            hop_index: self.config.initial_hop_index,
        })
        .await
    }

    /// Drive hops in a local loop instead of dispatching, with the same hop bound.
    pub async fn run_local(&self, tree: Roadmap) -> Result<Roadmap, ApiError> {
        let mut tree = tree;
        let mut hop_index = self.config.initial_hop_index;
        loop {
            match self.hop(tree).await? {
                HopOutcome::Complete(done) => return Ok(done),
                HopOutcome::Incomplete { tree: partial, reason } => {
                    if hop_index >= self.config.max_hops {
                        error!(hop_index, ?reason, "Continuation hop bound reached");
                        return Err(ApiError::Exhausted {
                            hops: hop_index,
                            partial: Box::new(partial),
                        });
                    }
                    tree = partial;
                    hop_index += 1;
                }
            }
        }
    }
}

#[async_trait]
impl JobHandler for ContinuationScheduler {
    async fn run(&self, payload: Value) -> Result<Value, ApiError> {
        let state: ContinuationState = serde_json::from_value(payload)
            .map_err(|e| ApiError::Validation(format!("invalid continuation payload: {e}")))?;
        let tree = self.handle(state).await?;
        Ok(serde_json::to_value(&tree).map_err(StorageError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InProcessDispatcher;
    use crate::tree::{fixtures, SearchResult, WebResult};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted responses, then succeeds.
    struct ScriptedSearch {
        script: Mutex<VecDeque<Result<(), ApiError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSearch {
        fn new(script: Vec<Result<(), ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ResourceSearch for ScriptedSearch {
        async fn search(&self, term: &str) -> Result<SearchResult, ApiError> {
            self.calls.lock().push(term.to_string());
            if let Some(Err(e)) = self.script.lock().pop_front() {
                return Err(e);
            }
            Ok(SearchResult {
                web_results: vec![WebResult {
                    title: term.to_string(),
                    url: format!("https://example.com/{}", term.len()),
                    description: String::new(),
                }],
                video_results: Vec::new(),
            })
        }
    }

    fn config(max_hops: u32) -> SchedulerConfig {
        SchedulerConfig {
            max_hops,
            ..SchedulerConfig::default()
        }
    }

    fn scheduler(
        search: Arc<ScriptedSearch>,
        max_hops: u32,
    ) -> (Arc<InProcessDispatcher>, Arc<ContinuationScheduler>) {
        let dispatcher = Arc::new(InProcessDispatcher::new());
        let scheduler = Arc::new(ContinuationScheduler::new(
            search,
            dispatcher.clone(),
            config(max_hops),
        ));
        dispatcher.register(scheduler.job_name(), &scheduler);
        (dispatcher, scheduler)
    }

    fn throttled() -> Result<(), ApiError> {
        Err(ApiError::RateLimited("429".to_string()))
    }

    #[tokio::test]
    async fn hop_over_enriched_tree_makes_no_calls() {
        let search = ScriptedSearch::new(Vec::new());
        let (_d, scheduler) = scheduler(search.clone(), 3);
        let mut tree = fixtures::shaped(&[&[1, 1]]);
        for phase in tree.phases.iter_mut() {
            for topic in phase.topics.iter_mut() {
                topic.search_result = Some(SearchResult::default());
            }
        }
        let outcome = scheduler.hop(tree.clone()).await.unwrap();
        assert_eq!(outcome, HopOutcome::Complete(tree));
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_stops_at_failing_topic() {
        let search = ScriptedSearch::new(vec![Ok(()), throttled()]);
        let (_d, scheduler) = scheduler(search.clone(), 3);
        let tree = fixtures::shaped(&[&[1, 1], &[1]]);
        match scheduler.hop(tree).await.unwrap() {
            HopOutcome::Incomplete { tree, reason } => {
                assert_eq!(reason, StopReason::RateLimited);
                assert_eq!(tree.enriched_topic_count(), 1);
                assert!(!tree.phases[1].topics[0].is_enriched());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(search.calls().len(), 2);
    }

    #[tokio::test]
    async fn resumes_through_dispatcher_without_repeating_topics() {
        let search = ScriptedSearch::new(vec![Ok(()), throttled(), throttled()]);
        let (dispatcher, scheduler) = scheduler(search.clone(), 5);
        let tree = fixtures::shaped(&[&[1, 1, 1]]);
        let done = scheduler.enrich(tree).await.unwrap();
        assert!(done.is_fully_enriched());
        assert_eq!(dispatcher.dispatched(), 2);
        // One success, two throttled attempts on topic 2, then topics 2 and 3.
        let calls = search.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0], "topic 0.0 Rust");
        assert_eq!(calls[3], "topic 0.1 Rust");
        assert_eq!(calls[4], "topic 0.2 Rust");
    }

    #[tokio::test]
    async fn other_failures_abort_the_job() {
        let search = ScriptedSearch::new(vec![Err(ApiError::Upstream("500".to_string()))]);
        let (dispatcher, scheduler) = scheduler(search, 5);
        let err = scheduler
            .enrich(fixtures::shaped(&[&[1]]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[tokio::test]
    async fn always_throttled_exhausts_at_bound() {
        let search = ScriptedSearch::new((0..50).map(|_| throttled()).collect());
        let (dispatcher, scheduler) = scheduler(search.clone(), 4);
        let err = scheduler
            .enrich(fixtures::shaped(&[&[2]]))
            .await
            .unwrap_err();
        match err {
            ApiError::Exhausted { hops, partial } => {
                assert_eq!(hops, 4);
                assert_eq!(partial.enriched_topic_count(), 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(search.calls().len(), 4);
        assert_eq!(dispatcher.dispatched(), 3);
    }

    #[tokio::test]
    async fn local_driver_shares_the_bound() {
        let search = ScriptedSearch::new((0..50).map(|_| throttled()).collect());
        let (dispatcher, scheduler) = scheduler(search.clone(), 3);
        let err = scheduler
            .run_local(fixtures::shaped(&[&[1]]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Exhausted { hops: 3, .. }));
        assert_eq!(search.calls().len(), 3);
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[tokio::test]
    async fn elapsed_budget_still_searches_one_topic() {
        let search = ScriptedSearch::new(Vec::new());
        let dispatcher = Arc::new(InProcessDispatcher::new());
        let scheduler = ContinuationScheduler::new(
            search.clone(),
            dispatcher,
            SchedulerConfig {
                hop_budget_ms: Some(0),
                ..SchedulerConfig::default()
            },
        );
        match scheduler.hop(fixtures::shaped(&[&[1, 1, 1]])).await.unwrap() {
            HopOutcome::Incomplete { tree, reason } => {
                assert_eq!(reason, StopReason::BudgetElapsed);
                assert_eq!(tree.enriched_topic_count(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(search.calls().len(), 1);
    }
}
