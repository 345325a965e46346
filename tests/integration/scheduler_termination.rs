use crate::integration::support::{self, shaped};
use async_trait::async_trait;
use parking_lot::Mutex;
use skillsprint::config::SchedulerConfig;
use skillsprint::dispatch::InProcessDispatcher;
use skillsprint::error::ApiError;
use skillsprint::scheduler::ContinuationScheduler;
use skillsprint::search::ResourceSearch;
use skillsprint::tree::{SearchResult, WebResult};
use std::sync::Arc;

/// Throttles every call whose 1-based ordinal satisfies `throttle`.
struct PatternSearch {
    throttle: fn(usize) -> bool,
    calls: Mutex<Vec<String>>,
}

impl PatternSearch {
    fn new(throttle: fn(usize) -> bool) -> Arc<Self> {
        Arc::new(Self {
            throttle,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ResourceSearch for PatternSearch {
    async fn search(&self, term: &str) -> Result<SearchResult, ApiError> {
        let ordinal = {
            let mut calls = self.calls.lock();
            calls.push(term.to_string());
            calls.len()
        };
        if (self.throttle)(ordinal) {
            return Err(ApiError::RateLimited(format!("call {ordinal}")));
        }
        Ok(SearchResult {
            web_results: vec![WebResult {
                title: term.to_string(),
                url: format!("https://example.com/{ordinal}"),
                description: String::new(),
            }],
            video_results: Vec::new(),
        })
    }
}

fn wired(
    search: Arc<PatternSearch>,
    max_hops: u32,
) -> (Arc<InProcessDispatcher>, Arc<ContinuationScheduler>) {
    let dispatcher = Arc::new(InProcessDispatcher::new());
    let scheduler = Arc::new(ContinuationScheduler::new(
        search,
        dispatcher.clone(),
        SchedulerConfig {
            max_hops,
            ..SchedulerConfig::default()
        },
    ));
    dispatcher.register(scheduler.job_name(), &scheduler);
    (dispatcher, scheduler)
}

#[tokio::test]
async fn permanent_throttling_stops_after_exactly_max_hops() {
    for max_hops in [1u32, 2, 6] {
        let search = PatternSearch::new(|_| true);
        let (dispatcher, scheduler) = wired(search.clone(), max_hops);
        let err = scheduler
            .enrich(shaped("Rust", &[vec![1, 1], vec![1]]))
            .await
            .unwrap_err();
        match err {
            ApiError::Exhausted { hops, partial } => {
                assert_eq!(hops, max_hops);
                assert_eq!(partial.enriched_topic_count(), 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(search.calls().len(), max_hops as usize);
        assert_eq!(dispatcher.dispatched(), max_hops as usize - 1);
    }
}

#[tokio::test]
async fn fully_enriched_tree_is_a_no_op() {
    let search = PatternSearch::new(|_| true);
    let (dispatcher, scheduler) = wired(search.clone(), 3);
    let mut tree = shaped("Rust", &[vec![1, 2]]);
    for phase in tree.phases.iter_mut() {
        for topic in phase.topics.iter_mut() {
            topic.search_result = Some(SearchResult::default());
        }
    }
    let done = scheduler.enrich(tree.clone()).await.unwrap();
    assert_eq!(done, tree);
    assert!(search.calls().is_empty());
    assert_eq!(dispatcher.dispatched(), 0);
}

#[tokio::test]
async fn every_hop_keeps_earlier_results() {
    // every other call is throttled, so each hop enriches exactly one topic
    let search = PatternSearch::new(|n| n % 2 == 0);
    let (dispatcher, scheduler) = wired(search.clone(), 10);
    let done = scheduler
        .enrich(shaped("Rust", &[vec![1, 1], vec![1, 1]]))
        .await
        .unwrap();
    assert!(done.is_fully_enriched());
    assert_eq!(dispatcher.dispatched(), 3);

    let calls = search.calls();
    assert_eq!(calls.len(), 7);
    // a throttled topic is retried first by the next hop, never skipped
    assert_eq!(calls[1], calls[2]);
    assert_eq!(calls[3], calls[4]);
    assert_eq!(calls[5], calls[6]);
    let urls: Vec<String> = done
        .topics()
        .filter_map(|t| t.search_result.as_ref())
        .map(|r| r.web_results[0].url.clone())
        .collect();
    assert_eq!(
        urls,
        ["1", "3", "5", "7"].map(|n| format!("https://example.com/{n}"))
    );
}

#[tokio::test]
async fn enriched_tree_persists_through_codec() {
    let (_dir, _store, codec) = support::codec();
    let search = PatternSearch::new(|n| n == 1);
    let (_dispatcher, scheduler) = wired(search, 4);
    let done = scheduler.enrich(shaped("Go", &[vec![2], vec![1]])).await.unwrap();

    let roadmap_id = codec.save(&done).unwrap();
    let loaded = codec.load(&roadmap_id).unwrap();
    assert!(loaded.is_fully_enriched());
    assert!(codec.verify(&roadmap_id).unwrap().is_empty());
}
