//! Connected-component clustering for graph payloads

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of clusters reported in graph summaries
pub const TOP_CLUSTERS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    /// Share of all nodes, 0-100
    pub percentage: f64,
}

/// Assign a component id to each of `node_count` nodes.
///
/// Edges are treated as undirected. Seeds are visited in node order and
/// neighbours in edge order, so ids follow BFS discovery order starting at 0.
pub fn assign_clusters(node_count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(a, b) in edges {
        adjacency[a].push(b);
        if a != b {
            adjacency[b].push(a);
        }
    }

    let mut cluster_of: Vec<Option<usize>> = vec![None; node_count];
    let mut next_id = 0;
    let mut queue = VecDeque::new();

    for seed in 0..node_count {
        if cluster_of[seed].is_some() {
            continue;
        }
        cluster_of[seed] = Some(next_id);
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            for &neighbor in &adjacency[current] {
                if cluster_of[neighbor].is_none() {
                    cluster_of[neighbor] = Some(next_id);
                    queue.push_back(neighbor);
                }
            }
        }
        next_id += 1;
    }

    cluster_of.into_iter().map(|c| c.unwrap_or_default()).collect()
}

/// Largest clusters first (smaller id on ties), at most `limit` entries
pub fn cluster_summary(assignments: &[usize], limit: usize) -> Vec<ClusterSummary> {
    if assignments.is_empty() {
        return Vec::new();
    }

    let cluster_count = assignments.iter().copied().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; cluster_count];
    for &c in assignments {
        sizes[c] += 1;
    }

    let mut ranked: Vec<(usize, usize)> = sizes.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total = assignments.len() as f64;
    ranked
        .into_iter()
        .take(limit)
        .map(|(cluster, size)| ClusterSummary {
            cluster,
            size,
            percentage: size as f64 / total * 100.0,
        })
        .collect()
}
