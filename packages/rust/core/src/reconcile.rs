//! Turning a crawled page graph into persistence instructions.
//!
//! Everything here is pure: the launcher feeds in the graph, the stored
//! sources and the ids storage hands back, and gets plain values out.
//! Ordering is always by [`CrawledPage::seq`], so the outcome does not
//! depend on the order in which fetches completed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use topicrawl_crawler::{CrawledPage, PageGraph};
use topicrawl_scoring::{Bm25Params, Bm25Scorer};
use topicrawl_shared::{
    NewSource, Result, Source, SourceIds, SourceStatus, SourceUpdate, TaskSourceEdge,
    TopicrawlError,
};

/// A page that passed the weight filter.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPage {
    pub url: String,
    pub parent_url: Option<String>,
    pub weight: f64,
    pub seq: usize,
}

/// Create and update batches for one launch. URL sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePlan {
    pub to_create: Vec<NewSource>,
    pub to_update: Vec<SourceUpdate>,
}

impl SourcePlan {
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn in_seq_order(graph: &PageGraph) -> Vec<&CrawledPage> {
    let mut pages: Vec<&CrawledPage> = graph.iter().collect();
    pages.sort_by_key(|p| p.seq);
    pages
}

/// BM25 weight of every available page. All pages are added before any is
/// scored; unavailable pages are not part of the corpus.
pub fn score_pages(graph: &PageGraph, query: &str, params: Bm25Params) -> HashMap<String, f64> {
    let mut scorer = Bm25Scorer::new(query, params);
    let available: Vec<&CrawledPage> = graph.iter().filter(|p| p.page.is_available()).collect();

    for crawled in &available {
        scorer.add_page(&crawled.page.url, &crawled.page);
    }

    available
        .iter()
        .filter_map(|crawled| {
            let url = crawled.page.url.as_str();
            scorer.score(url).map(|weight| (url.to_string(), weight))
        })
        .collect()
}

/// Keep scored pages whose weight is strictly above `min_weight`.
pub fn filter_by_weight(
    graph: &PageGraph,
    weights: &HashMap<String, f64>,
    min_weight: f64,
) -> Vec<WeightedPage> {
    in_seq_order(graph)
        .into_iter()
        .filter_map(|crawled| {
            let weight = *weights.get(&crawled.page.url)?;
            (weight > min_weight).then(|| WeightedPage {
                url: crawled.page.url.clone(),
                parent_url: crawled.parent_url.clone(),
                weight,
                seq: crawled.seq,
            })
        })
        .collect()
}

/// Keep pages connected to a root through surviving pages, at most
/// `max_sources` of them.
///
/// Roots are visited in seed order, and each subtree depth-first with
/// children in the order they were scheduled. A page whose parent did not
/// survive is dropped along with its whole subtree.
pub fn prune_disconnected(pages: Vec<WeightedPage>, max_sources: usize) -> Vec<WeightedPage> {
    let mut by_seq = pages;
    by_seq.sort_by_key(|p| p.seq);

    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (i, page) in by_seq.iter().enumerate() {
        match &page.parent_url {
            Some(parent) => children.entry(parent.as_str()).or_default().push(i),
            None => roots.push(i),
        }
    }

    let mut kept: Vec<usize> = Vec::new();
    let mut seen: HashSet<usize> = HashSet::new();

    'roots: for root in roots {
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            if kept.len() >= max_sources {
                break 'roots;
            }
            if !seen.insert(i) {
                continue;
            }
            kept.push(i);
            if let Some(next) = children.get(by_seq[i].url.as_str()) {
                stack.extend(next.iter().rev());
            }
        }
    }

    kept.into_iter().map(|i| by_seq[i].clone()).collect()
}

/// Decide which fetched pages create or update a source.
///
/// Every fetched page with a stored source becomes an update, available or
/// not. A page without one is created only when it is available and kept.
pub fn plan_sources(
    graph: &PageGraph,
    kept: &[WeightedPage],
    existing: &[Source],
    now: DateTime<Utc>,
) -> SourcePlan {
    let existing: HashMap<&str, i64> = existing.iter().map(|s| (s.url.as_str(), s.id)).collect();
    let kept: HashSet<&str> = kept.iter().map(|p| p.url.as_str()).collect();
    let mut plan = SourcePlan::default();

    for crawled in in_seq_order(graph) {
        let page = &crawled.page;
        let status = SourceStatus::from(page.status);

        if let Some(&id) = existing.get(page.url.as_str()) {
            plan.to_update.push(SourceUpdate {
                id,
                url: page.url.clone(),
                title: page.title.clone(),
                status,
                updated_at: now,
            });
        } else if page.is_available() && kept.contains(page.url.as_str()) {
            plan.to_create.push(NewSource {
                url: page.url.clone(),
                title: page.title.clone(),
                status,
                created_at: now,
            });
        }
    }

    plan
}

/// Merge the id maps returned for the create and update batches.
///
/// Each map must hold exactly one entry per submitted row, and the two must
/// not share a URL.
pub fn merge_source_ids(
    plan: &SourcePlan,
    created: SourceIds,
    updated: SourceIds,
) -> Result<SourceIds> {
    if created.len() != plan.to_create.len() {
        return Err(TopicrawlError::integrity(format!(
            "created {} sources, expected {}",
            created.len(),
            plan.to_create.len()
        )));
    }
    if updated.len() != plan.to_update.len() {
        return Err(TopicrawlError::integrity(format!(
            "updated {} sources, expected {}",
            updated.len(),
            plan.to_update.len()
        )));
    }

    let mut ids = created;
    ids.extend(updated);

    if ids.len() != plan.len() {
        return Err(TopicrawlError::integrity(
            "created and updated sources overlap",
        ));
    }
    Ok(ids)
}

/// One edge per kept page, with its parent's source id resolved.
pub fn build_edges(
    task_id: i64,
    launch_id: i64,
    kept: &[WeightedPage],
    ids: &SourceIds,
) -> Result<Vec<TaskSourceEdge>> {
    let resolve = |url: &str| {
        ids.get(url)
            .copied()
            .ok_or_else(|| TopicrawlError::integrity(format!("no source id for {url}")))
    };

    kept.iter()
        .map(|page| {
            Ok(TaskSourceEdge {
                task_id,
                launch_id,
                source_id: resolve(&page.url)?,
                parent_source_id: page.parent_url.as_deref().map(resolve).transpose()?,
                weight: page.weight,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicrawl_shared::{Page, PageStatus};

    const A: &str = "https://a.test/";
    const B: &str = "https://b.test/";
    const C: &str = "https://c.test/";
    const D: &str = "https://d.test/";

    fn crawled(url: &str, parent: Option<&str>, seq: usize, content: &str) -> CrawledPage {
        CrawledPage {
            page: Page {
                url: url.into(),
                status: PageStatus::Available,
                title: format!("title {url}"),
                content: content.into(),
                links: Vec::new(),
            },
            parent_url: parent.map(String::from),
            depth: if parent.is_some() { 1 } else { 0 },
            seq,
        }
    }

    fn unavailable(url: &str, parent: Option<&str>, seq: usize) -> CrawledPage {
        CrawledPage {
            page: Page::unavailable(url),
            parent_url: parent.map(String::from),
            depth: if parent.is_some() { 1 } else { 0 },
            seq,
        }
    }

    fn graph(pages: Vec<CrawledPage>) -> PageGraph {
        let mut graph = PageGraph::default();
        for page in pages {
            graph.insert(page);
        }
        graph
    }

    fn weighted(url: &str, parent: Option<&str>, seq: usize) -> WeightedPage {
        WeightedPage {
            url: url.into(),
            parent_url: parent.map(String::from),
            weight: 1.0,
            seq,
        }
    }

    fn urls(pages: &[WeightedPage]) -> Vec<&str> {
        pages.iter().map(|p| p.url.as_str()).collect()
    }

    fn source(id: i64, url: &str) -> Source {
        Source {
            id,
            url: url.into(),
            title: "stored".into(),
            status: SourceStatus::Available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unavailable_pages_are_not_scored() {
        let graph = graph(vec![
            crawled(A, None, 0, "go programming language"),
            unavailable(B, Some(A), 1),
        ]);
        let weights = score_pages(&graph, "go programming", Bm25Params::default());
        assert!(weights.contains_key(A));
        assert!(!weights.contains_key(B));
    }

    #[test]
    fn weight_filter_drops_at_or_below_threshold() {
        let graph = graph(vec![
            crawled(A, None, 0, ""),
            crawled(B, Some(A), 1, ""),
            crawled(C, Some(A), 2, ""),
        ]);
        let weights = HashMap::from([(A.to_string(), 2.0), (B.to_string(), 0.5), (C.to_string(), 0.4)]);

        let kept = filter_by_weight(&graph, &weights, 0.5);
        assert_eq!(urls(&kept), vec![A]);
    }

    #[test]
    fn pruning_drops_orphaned_branches() {
        // B was filtered out, so its child D goes too.
        let pages = vec![weighted(A, None, 0), weighted(C, Some(A), 2), weighted(D, Some(B), 3)];
        let kept = prune_disconnected(pages, 10);
        assert_eq!(urls(&kept), vec![A, C]);
    }

    #[test]
    fn pruning_respects_budget_in_seed_order() {
        let pages = vec![
            weighted(B, None, 1),
            weighted(D, Some(B), 3),
            weighted(A, None, 0),
            weighted(C, Some(A), 2),
        ];
        let kept = prune_disconnected(pages, 3);
        assert_eq!(urls(&kept), vec![A, C, B]);

        let kept = prune_disconnected(
            vec![weighted(A, None, 0), weighted(B, Some(A), 1)],
            0,
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn kept_set_is_parent_closed() {
        let pages = vec![
            weighted(A, None, 0),
            weighted(B, Some(A), 1),
            weighted(C, Some(B), 2),
            weighted(D, Some(C), 3),
        ];
        for budget in 0..=4 {
            let kept = prune_disconnected(pages.clone(), budget);
            let present: HashSet<&str> = kept.iter().map(|p| p.url.as_str()).collect();
            for page in &kept {
                if let Some(parent) = &page.parent_url {
                    assert!(present.contains(parent.as_str()), "dangling parent at budget {budget}");
                }
            }
        }
    }

    #[test]
    fn plan_updates_existing_and_creates_only_kept_available() {
        let graph = graph(vec![
            crawled(A, None, 0, ""),
            crawled(B, Some(A), 1, ""),
            unavailable(C, Some(A), 2),
            crawled(D, Some(A), 3, ""),
        ]);
        let kept = vec![weighted(A, None, 0), weighted(B, Some(A), 1)];
        let existing = vec![source(7, A), source(9, D)];

        let plan = plan_sources(&graph, &kept, &existing, Utc::now());
        let created: Vec<&str> = plan.to_create.iter().map(|s| s.url.as_str()).collect();
        let updated: Vec<(i64, &str)> = plan.to_update.iter().map(|s| (s.id, s.url.as_str())).collect();
        assert_eq!(created, vec![B]);
        assert_eq!(updated, vec![(7, A), (9, D)]);
    }

    #[test]
    fn unavailable_existing_source_is_updated_never_created() {
        let graph = graph(vec![unavailable(A, None, 0)]);
        let weights = score_pages(&graph, "go", Bm25Params::default());
        let kept = prune_disconnected(filter_by_weight(&graph, &weights, 0.0), 10);
        assert!(kept.is_empty());

        let plan = plan_sources(&graph, &kept, &[source(3, A)], Utc::now());
        assert!(plan.to_create.is_empty());
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].status, SourceStatus::Unavailable);

        let ids = SourceIds::from([(A.to_string(), 3)]);
        assert!(build_edges(1, 1, &kept, &ids).unwrap().is_empty());
    }

    #[test]
    fn merge_counts_must_match() {
        let plan = SourcePlan {
            to_create: vec![NewSource {
                url: B.into(),
                title: String::new(),
                status: SourceStatus::Available,
                created_at: Utc::now(),
            }],
            to_update: vec![SourceUpdate {
                id: 1,
                url: A.into(),
                title: String::new(),
                status: SourceStatus::Available,
                updated_at: Utc::now(),
            }],
        };

        let ids = merge_source_ids(
            &plan,
            SourceIds::from([(B.to_string(), 2)]),
            SourceIds::from([(A.to_string(), 1)]),
        )
        .unwrap();
        assert_eq!(ids.len(), plan.len());

        let err = merge_source_ids(&plan, SourceIds::new(), SourceIds::from([(A.to_string(), 1)]));
        assert!(matches!(err, Err(TopicrawlError::Integrity { .. })));
    }

    #[test]
    fn overlapping_batches_are_an_integrity_error() {
        let plan = SourcePlan {
            to_create: vec![NewSource {
                url: A.into(),
                title: String::new(),
                status: SourceStatus::Available,
                created_at: Utc::now(),
            }],
            to_update: vec![SourceUpdate {
                id: 1,
                url: A.into(),
                title: String::new(),
                status: SourceStatus::Available,
                updated_at: Utc::now(),
            }],
        };
        let err = merge_source_ids(
            &plan,
            SourceIds::from([(A.to_string(), 1)]),
            SourceIds::from([(A.to_string(), 1)]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn edges_resolve_parents_or_fail() {
        let kept = vec![weighted(A, None, 0), weighted(B, Some(A), 1)];
        let ids = SourceIds::from([(A.to_string(), 10), (B.to_string(), 11)]);

        let edges = build_edges(5, 6, &kept, &ids).unwrap();
        assert_eq!(edges[0].parent_source_id, None);
        assert_eq!(edges[1].source_id, 11);
        assert_eq!(edges[1].parent_source_id, Some(10));
        assert!(edges.iter().all(|e| e.task_id == 5 && e.launch_id == 6));

        let missing_parent = SourceIds::from([(B.to_string(), 11)]);
        assert!(build_edges(5, 6, &kept[1..], &missing_parent).is_err());
    }
}
