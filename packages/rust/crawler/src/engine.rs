//! Bounded, concurrent crawl engine.
//!
//! Seeds come from a [`SearchGate`]; pages come from a [`PageFetcher`].
//! A fixed pool of workers pulls jobs from a shared queue and reports every
//! fetched page to a single coordinator, which owns the scheduled set and
//! the page graph, and decides what gets enqueued next.
//!
//! Depth is counted in hops from the seed: seeds are at depth 0 and a page
//! only expands its links while `depth < depth_level`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use topicrawl_shared::{
    Page, PageFetcher, Result, SearchGate, Task, TaskParams, TopicrawlError,
};

use crate::fetcher::normalize_url;

/// Number of concurrent fetch workers per crawl.
pub const CRAWL_WORKERS: usize = 8;

/// Upper bound on a single page fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Bounds for one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub query: String,
    /// Hops followed from the seeds.
    pub depth_level: u32,
    /// Maximum URLs scheduled, seeds included.
    pub max_sources: u32,
    /// Maximum links followed per page.
    pub max_neighbours_per_source: u32,
}

impl CrawlRequest {
    pub fn new(query: impl Into<String>, params: &TaskParams) -> Self {
        Self {
            query: query.into(),
            depth_level: params.depth_level,
            max_sources: params.max_sources,
            max_neighbours_per_source: params.max_neighbours_per_source,
        }
    }

    pub fn for_task(task: &Task) -> Self {
        Self::new(task.query.clone(), &task.params)
    }
}

/// A page as placed in the crawl graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    pub page: Page,
    /// URL of the page this one was discovered on; `None` for seeds.
    pub parent_url: Option<String>,
    pub depth: u32,
    /// Position in scheduling order: seeds first, in search order, then
    /// links in the order they were enqueued.
    pub seq: usize,
}

/// Every page fetched by one crawl, in the order results arrived.
#[derive(Debug, Clone, Default)]
pub struct PageGraph {
    pages: Vec<CrawledPage>,
    index: HashMap<String, usize>,
}

impl PageGraph {
    /// Record a page. Returns `false` if its URL is already present.
    pub fn insert(&mut self, page: CrawledPage) -> bool {
        if self.index.contains_key(&page.page.url) {
            return false;
        }
        self.index.insert(page.page.url.clone(), self.pages.len());
        self.pages.push(page);
        true
    }

    pub fn get(&self, url: &str) -> Option<&CrawledPage> {
        self.index.get(url).map(|&i| &self.pages[i])
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    /// Pages in the order their fetches completed.
    pub fn pages(&self) -> &[CrawledPage] {
        &self.pages
    }

    pub fn iter(&self) -> impl Iterator<Item = &CrawledPage> {
        self.pages.iter()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of pages that were fetched successfully.
    pub fn available_count(&self) -> usize {
        self.pages.iter().filter(|p| p.page.is_available()).count()
    }
}

/// Number of pages a crawl has recorded so far. Clones share the count, so
/// it stays readable after the crawl future is dropped.
#[derive(Debug, Clone, Default)]
pub struct CrawlCounter(Arc<AtomicUsize>);

impl CrawlCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct Job {
    url: String,
    parent_url: Option<String>,
    depth: u32,
    seq: usize,
}

// ---------------------------------------------------------------------------
// CrawlEngine
// ---------------------------------------------------------------------------

/// Crawl engine over a search gate and a page fetcher.
pub struct CrawlEngine {
    search: Arc<dyn SearchGate>,
    fetcher: Arc<dyn PageFetcher>,
    workers: usize,
    fetch_timeout: Duration,
}

impl CrawlEngine {
    pub fn new(search: Arc<dyn SearchGate>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            search,
            fetcher,
            workers: CRAWL_WORKERS,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }

    /// Override the per-page fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Override the worker count (at least one worker always runs).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run a crawl for `request` and return the page graph.
    ///
    /// Fails with `SearchSystem`/`NoSeedSources` before any page is fetched,
    /// or with `Cancelled` once `cancel` fires.
    pub async fn start(
        &self,
        request: &CrawlRequest,
        cancel: &CancellationToken,
    ) -> Result<PageGraph> {
        self.start_counted(request, cancel, &CrawlCounter::default()).await
    }

    /// Like [`start`](Self::start), bumping `counter` once per recorded page.
    #[instrument(skip_all, fields(query = %request.query, depth_level = request.depth_level, max_sources = request.max_sources))]
    pub async fn start_counted(
        &self,
        request: &CrawlRequest,
        cancel: &CancellationToken,
        counter: &CrawlCounter,
    ) -> Result<PageGraph> {
        let raw_seeds = tokio::select! {
            _ = cancel.cancelled() => return Err(TopicrawlError::Cancelled),
            seeds = self.search.search(&request.query) => seeds?,
        };

        let mut seen = HashSet::new();
        let seeds: Vec<String> = raw_seeds
            .iter()
            .filter_map(|s| normalize_url(s))
            .filter(|s| seen.insert(s.clone()))
            .collect();

        if seeds.is_empty() {
            info!("search returned no usable seed URLs");
            return Err(TopicrawlError::NoSeedSources {
                query: request.query.clone(),
            });
        }

        info!(seeds = seeds.len(), workers = self.workers, "starting crawl");

        let (job_tx, job_rx) = mpsc::unbounded_channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel::<(Job, Page)>(self.workers);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            workers.spawn(worker(
                job_rx.clone(),
                result_tx.clone(),
                self.fetcher.clone(),
                self.fetch_timeout,
                cancel.clone(),
            ));
        }
        drop(result_tx);

        let coordinator = Coordinator::new(request, job_tx, counter.clone());
        let outcome = coordinator.run(seeds, result_rx, cancel).await;

        match &outcome {
            Ok(graph) => {
                // The job sender is gone, so idle workers see a closed queue.
                while workers.join_next().await.is_some() {}
                info!(
                    pages = graph.len(),
                    available = graph.available_count(),
                    "crawl completed"
                );
            }
            Err(e) => {
                workers.abort_all();
                warn!(error = %e, "crawl aborted");
            }
        }

        outcome
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Single owner of the scheduled set, the graph and the pending counter.
struct Coordinator {
    depth_level: u32,
    max_sources: usize,
    max_neighbours: usize,
    jobs: mpsc::UnboundedSender<Job>,
    scheduled: HashSet<String>,
    graph: PageGraph,
    pending: usize,
    recorded: CrawlCounter,
}

impl Coordinator {
    fn new(
        request: &CrawlRequest,
        jobs: mpsc::UnboundedSender<Job>,
        recorded: CrawlCounter,
    ) -> Self {
        Self {
            depth_level: request.depth_level,
            max_sources: request.max_sources as usize,
            max_neighbours: request.max_neighbours_per_source as usize,
            jobs,
            scheduled: HashSet::new(),
            graph: PageGraph::default(),
            pending: 0,
            recorded,
        }
    }

    async fn run(
        mut self,
        seeds: Vec<String>,
        mut results: mpsc::Receiver<(Job, Page)>,
        cancel: &CancellationToken,
    ) -> Result<PageGraph> {
        for seed in seeds {
            if !self.schedule(seed, None, 0)? {
                break;
            }
        }

        while self.pending > 0 {
            let received = tokio::select! {
                _ = cancel.cancelled() => return Err(TopicrawlError::Cancelled),
                received = results.recv() => received,
            };
            let Some((job, page)) = received else {
                return Err(TopicrawlError::integrity(format!(
                    "crawl workers exited with {} jobs pending",
                    self.pending
                )));
            };
            self.pending -= 1;
            self.handle(job, page)?;
        }

        Ok(self.graph)
    }

    fn handle(&mut self, job: Job, page: Page) -> Result<()> {
        if self.graph.contains(&job.url) {
            return Ok(());
        }

        let expand = page.is_available() && job.depth < self.depth_level;
        let links = if expand { page.links.clone() } else { Vec::new() };
        let parent = job.url.clone();

        debug!(
            url = %job.url,
            depth = job.depth,
            available = page.is_available(),
            links = page.links.len(),
            "page recorded"
        );

        self.graph.insert(CrawledPage {
            page,
            parent_url: job.parent_url,
            depth: job.depth,
            seq: job.seq,
        });
        self.recorded.record();

        let mut candidates: Vec<String> = Vec::new();
        for link in links.iter().filter_map(|l| normalize_url(l)) {
            if candidates.len() >= self.max_neighbours {
                break;
            }
            if !self.scheduled.contains(&link) && !candidates.contains(&link) {
                candidates.push(link);
            }
        }

        for link in candidates {
            if !self.schedule(link, Some(parent.clone()), job.depth + 1)? {
                break;
            }
        }

        Ok(())
    }

    /// Enqueue `url` if the volume budget allows. Returns `false` once the
    /// budget is exhausted.
    fn schedule(&mut self, url: String, parent_url: Option<String>, depth: u32) -> Result<bool> {
        if self.scheduled.len() >= self.max_sources {
            return Ok(false);
        }
        let seq = self.scheduled.len();
        if !self.scheduled.insert(url.clone()) {
            return Ok(true);
        }
        self.jobs
            .send(Job {
                url,
                parent_url,
                depth,
                seq,
            })
            .map_err(|_| TopicrawlError::integrity("crawl job queue closed"))?;
        self.pending += 1;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn worker(
    jobs: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    results: mpsc::Sender<(Job, Page)>,
    fetcher: Arc<dyn PageFetcher>,
    fetch_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };

        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            fetched = tokio::time::timeout(fetch_timeout, fetcher.get_page(&job.url)) => fetched,
        };

        let mut page = match fetched {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                debug!(url = %job.url, error = %e, "page unavailable");
                Page::unavailable(&job.url)
            }
            Err(_) => {
                debug!(url = %job.url, timeout_ms = fetch_timeout.as_millis() as u64, "fetch timed out");
                Page::unavailable(&job.url)
            }
        };
        page.url.clone_from(&job.url);

        if results.send((job, page)).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use topicrawl_shared::{FetchError, PageStatus};

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    struct FakeSearch(std::result::Result<Vec<String>, String>);

    #[async_trait]
    impl SearchGate for FakeSearch {
        async fn search(&self, _query: &str) -> Result<Vec<String>> {
            self.0.clone().map_err(TopicrawlError::SearchSystem)
        }
    }

    /// In-memory web: URL → (links, body). Unknown URLs answer 404.
    #[derive(Default)]
    struct FakeWeb {
        pages: HashMap<String, (Vec<String>, String)>,
        delay: Option<Duration>,
        slow: HashMap<String, Duration>,
        fetches: StdMutex<HashMap<String, usize>>,
    }

    impl FakeWeb {
        fn page(mut self, url: &str, links: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                (links.iter().map(|l| l.to_string()).collect(), format!("body of {url}")),
            );
            self
        }

        fn slow(mut self, url: &str, delay: Duration) -> Self {
            self.slow.insert(url.to_string(), delay);
            self
        }

        fn fetch_count(&self, url: &str) -> usize {
            self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        fn total_fetches(&self) -> usize {
            self.fetches.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeWeb {
        async fn get_page(&self, url: &str) -> std::result::Result<Page, FetchError> {
            *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if let Some(delay) = self.delay.or_else(|| self.slow.get(url).copied()) {
                tokio::time::sleep(delay).await;
            }
            match self.pages.get(url) {
                Some((links, body)) => Ok(Page {
                    url: url.to_string(),
                    status: PageStatus::Available,
                    title: format!("title of {url}"),
                    content: body.clone(),
                    links: links.clone(),
                }),
                None => Err(FetchError::Unavailable {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn request(depth_level: u32, max_sources: u32, max_neighbours: u32) -> CrawlRequest {
        CrawlRequest {
            query: "go programming".into(),
            depth_level,
            max_sources,
            max_neighbours_per_source: max_neighbours,
        }
    }

    fn engine(seeds: &[&str], web: Arc<FakeWeb>) -> CrawlEngine {
        let seeds = seeds.iter().map(|s| s.to_string()).collect();
        CrawlEngine::new(Arc::new(FakeSearch(Ok(seeds))), web)
    }

    async fn crawl(engine: &CrawlEngine, request: &CrawlRequest) -> Result<PageGraph> {
        engine.start(request, &CancellationToken::new()).await
    }

    const A: &str = "https://a.test/";
    const B: &str = "https://b.test/";
    const C: &str = "https://c.test/";
    const D: &str = "https://d.test/";
    const E: &str = "https://e.test/";

    // -----------------------------------------------------------------------
    // Seeds
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn search_failure_is_search_system_error() {
        let engine = CrawlEngine::new(
            Arc::new(FakeSearch(Err("searx down".into()))),
            Arc::new(FakeWeb::default()),
        );
        let err = crawl(&engine, &request(1, 10, 10)).await.unwrap_err();
        assert!(matches!(err, TopicrawlError::SearchSystem(_)));
    }

    #[tokio::test]
    async fn empty_search_is_no_seed_sources() {
        let web = Arc::new(FakeWeb::default());
        let engine = engine(&[], web.clone());
        let err = crawl(&engine, &request(1, 10, 10)).await.unwrap_err();
        assert!(matches!(err, TopicrawlError::NoSeedSources { .. }));
        assert_eq!(web.total_fetches(), 0);
    }

    #[tokio::test]
    async fn non_http_seeds_are_dropped() {
        let web = Arc::new(FakeWeb::default().page(A, &[]));
        let engine = engine(&["ftp://files.test/", "https://a.test/#top"], web.clone());
        let graph = crawl(&engine, &request(0, 10, 10)).await.unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(A));
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn depth_level_bounds_hops_from_seed() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[B])
                .page(B, &[C])
                .page(C, &[D])
                .page(D, &[]),
        );
        let engine = engine(&[A], web.clone());

        let graph = crawl(&engine, &request(1, 20, 20)).await.unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(A).unwrap().depth, 0);
        assert_eq!(graph.get(B).unwrap().depth, 1);
        assert_eq!(web.fetch_count(C), 0);
        assert!(graph.iter().all(|p| p.depth <= 1));
    }

    #[tokio::test]
    async fn depth_zero_fetches_only_seeds() {
        let web = Arc::new(FakeWeb::default().page(A, &[C]).page(B, &[D]));
        let engine = engine(&[A, B], web.clone());

        let graph = crawl(&engine, &request(0, 20, 20)).await.unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(web.total_fetches(), 2);
        assert!(graph.iter().all(|p| p.parent_url.is_none()));
    }

    #[tokio::test]
    async fn max_sources_caps_visited_urls() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[B, C, D, E])
                .page(B, &[])
                .page(C, &[])
                .page(D, &[])
                .page(E, &[]),
        );
        let engine = engine(&[A], web.clone());

        let graph = crawl(&engine, &request(3, 3, 20)).await.unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(web.total_fetches(), 3);
        assert!(graph.contains(B));
        assert!(graph.contains(C));
    }

    #[tokio::test]
    async fn max_sources_one_with_two_seeds_fetches_first_seed_only() {
        let web = Arc::new(FakeWeb::default().page(A, &[C]).page(B, &[]));
        let engine = engine(&[A, B], web.clone());

        let graph = crawl(&engine, &request(2, 1, 20)).await.unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(A));
        assert_eq!(web.fetch_count(B), 0);
    }

    #[tokio::test]
    async fn neighbours_are_truncated_in_link_order() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[B, C, D, E])
                .page(B, &[])
                .page(C, &[])
                .page(D, &[])
                .page(E, &[]),
        );
        let engine = engine(&[A], web.clone());

        let graph = crawl(&engine, &request(1, 20, 2)).await.unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.contains(B));
        assert!(graph.contains(C));
        assert!(!graph.contains(D));
        assert_eq!(graph.get(B).unwrap().parent_url.as_deref(), Some(A));
    }

    // -----------------------------------------------------------------------
    // Dedup, cycles, failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cyclic_graph_fetches_each_url_once() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[B, C, A])
                .page(B, &[A])
                .page(C, &[A, B, "https://c.test/#frag"]),
        );
        let engine = engine(&[A, B], web.clone());

        let graph = crawl(&engine, &request(5, 20, 20)).await.unwrap();
        assert_eq!(graph.len(), 3);
        for url in [A, B, C] {
            assert_eq!(web.fetch_count(url), 1, "{url} fetched more than once");
        }
        assert!(graph.get(B).unwrap().parent_url.is_none());
        assert_eq!(graph.get(C).unwrap().parent_url.as_deref(), Some(A));
    }

    #[tokio::test]
    async fn unavailable_pages_are_recorded_but_not_expanded() {
        let web = Arc::new(FakeWeb::default().page(A, &[B]).page(C, &[]));
        let engine = engine(&[A], web.clone());

        let graph = crawl(&engine, &request(3, 20, 20)).await.unwrap();
        let b = graph.get(B).unwrap();
        assert_eq!(b.page.status, PageStatus::Unavailable);
        assert_eq!(b.depth, 1);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.available_count(), 1);
    }

    #[tokio::test]
    async fn slow_fetch_becomes_unavailable() {
        let web = Arc::new(FakeWeb {
            delay: Some(Duration::from_millis(500)),
            ..FakeWeb::default()
        }
        .page(A, &[B]));
        let engine = engine(&[A], web).with_fetch_timeout(Duration::from_millis(20));

        let graph = crawl(&engine, &request(2, 20, 20)).await.unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(A).unwrap().page.status, PageStatus::Unavailable);
    }

    #[tokio::test]
    async fn cancellation_stops_the_crawl() {
        let web = Arc::new(FakeWeb {
            delay: Some(Duration::from_secs(30)),
            ..FakeWeb::default()
        }
        .page(A, &[]));
        let engine = engine(&[A], web).with_fetch_timeout(Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = engine.start(&request(1, 10, 10), &cancel).await.unwrap_err();
        assert!(matches!(err, TopicrawlError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn counter_survives_a_dropped_crawl() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[B])
                .page(B, &[])
                .slow(B, Duration::from_secs(30)),
        );
        let engine = engine(&[A], web).with_fetch_timeout(Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let counter = CrawlCounter::default();
        let req = request(2, 10, 10);
        let running = engine.start_counted(&req, &cancel, &counter);
        let outcome = tokio::time::timeout(Duration::from_millis(200), running).await;

        assert!(outcome.is_err(), "crawl should still be waiting on B");
        assert_eq!(counter.get(), 1);
    }

    #[tokio::test]
    async fn counter_matches_graph_len() {
        let web = Arc::new(FakeWeb::default().page(A, &[B, C]).page(B, &[A]));
        let engine = engine(&[A], web);

        let counter = CrawlCounter::default();
        let graph = engine
            .start_counted(&request(2, 10, 10), &CancellationToken::new(), &counter)
            .await
            .unwrap();
        assert_eq!(counter.get(), graph.len());
        assert_eq!(counter.get(), 3);
    }

    #[tokio::test]
    async fn single_worker_produces_same_graph() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[B, C])
                .page(B, &[D])
                .page(C, &[D])
                .page(D, &[]),
        );
        let engine = engine(&[A], web).with_workers(1);

        let graph = crawl(&engine, &request(2, 20, 20)).await.unwrap();
        let urls: Vec<&str> = graph.iter().map(|p| p.page.url.as_str()).collect();
        assert_eq!(urls, vec![A, B, C, D]);
        assert_eq!(graph.get(D).unwrap().parent_url.as_deref(), Some(B));
        assert_eq!(graph.get(D).unwrap().seq, 3);
    }

    #[tokio::test]
    async fn seq_follows_scheduling_order_not_arrival() {
        let web = Arc::new(
            FakeWeb::default()
                .page(A, &[C])
                .page(B, &[D])
                .page(C, &[])
                .page(D, &[]),
        );
        let engine = engine(&[A, B], web);

        let graph = crawl(&engine, &request(1, 20, 20)).await.unwrap();
        assert_eq!(graph.get(A).unwrap().seq, 0);
        assert_eq!(graph.get(B).unwrap().seq, 1);
        let mut seqs: Vec<usize> = graph.iter().map(|p| p.seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn crawl_request_from_params() {
        let params = TaskParams {
            depth_level: 2,
            min_weight: 0.1,
            max_sources: 7,
            max_neighbours_per_source: 3,
        };
        let req = CrawlRequest::new("rust", &params);
        assert_eq!(req, request_with("rust", 2, 7, 3));
    }

    fn request_with(query: &str, depth: u32, max_sources: u32, neighbours: u32) -> CrawlRequest {
        CrawlRequest {
            query: query.into(),
            depth_level: depth,
            max_sources,
            max_neighbours_per_source: neighbours,
        }
    }
}
