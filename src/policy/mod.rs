use std::collections::HashMap;
use std::sync::Arc;

use crate::node::NodeHandle;

/// Rarity-aware prefilter over capacity-filtered candidate nodes, followed by
/// the Distributor's own `(load, lastSessionCreatedAt, id)` ordering.
///
/// Pure and deterministic given the candidate set and the requested browser
/// name: no I/O, no shared state.
pub struct SelectionPolicy;

impl SelectionPolicy {
    pub fn new() -> Self {
        SelectionPolicy
    }

    /// Bucketizes `candidates` by every stereotype's `browserName`, then:
    ///
    /// - if all buckets are equal-sized, returns the union unchanged;
    /// - otherwise iterates buckets smallest-first (skipping the bucket
    ///   matching `requested_browser`), evicting every node in that bucket
    ///   from the working set and rebucketizing, stopping as soon as the
    ///   remaining buckets are equal-sized;
    /// - if no such point is reached, falls back to the original set.
    pub fn select(&self, candidates: &[Arc<NodeHandle>], requested_browser: Option<&str>) -> Vec<Arc<NodeHandle>> {
        let original: Vec<Arc<NodeHandle>> = candidates.to_vec();
        let mut working = original.clone();

        loop {
            let buckets = bucketize(&working);
            if buckets.is_empty() || all_equal_size(&buckets) {
                return distinct(&working);
            }

            let mut sizes: Vec<(&String, usize)> = buckets.iter().map(|(k, v)| (k, v.len())).collect();
            sizes.sort_by_key(|(_, size)| *size);

            let evictable = sizes.into_iter().find(|(name, _)| Some(name.as_str()) != requested_browser);

            let Some((evict_name, _)) = evictable else {
                return distinct(&original);
            };

            let evicted_ids: std::collections::HashSet<_> = buckets[evict_name].iter().map(|n| n.id()).collect();
            let next: Vec<Arc<NodeHandle>> = working.iter().filter(|n| !evicted_ids.contains(&n.id())).cloned().collect();

            if next.len() == working.len() {
                // evicting this bucket removed nothing new; avoid looping forever
                return distinct(&original);
            }
            working = next;

            let rebucketed = bucketize(&working);
            if rebucketed.is_empty() || all_equal_size(&rebucketed) {
                return distinct(&working);
            }
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn bucketize(nodes: &[Arc<NodeHandle>]) -> HashMap<String, Vec<Arc<NodeHandle>>> {
    let mut buckets: HashMap<String, Vec<Arc<NodeHandle>>> = HashMap::new();
    for node in nodes {
        for stereotype in node.stereotypes() {
            if let Some(name) = stereotype.browser_name() {
                buckets.entry(name.to_string()).or_default().push(node.clone());
            }
        }
    }
    buckets
}

fn all_equal_size(buckets: &HashMap<String, Vec<Arc<NodeHandle>>>) -> bool {
    let mut sizes = buckets.values().map(|v| v.len());
    match sizes.next() {
        Some(first) => sizes.all(|size| size == first),
        None => true,
    }
}

fn distinct(nodes: &[Arc<NodeHandle>]) -> Vec<Arc<NodeHandle>> {
    let mut seen = std::collections::HashSet::new();
    nodes.iter().filter(|n| seen.insert(n.id())).cloned().collect()
}
