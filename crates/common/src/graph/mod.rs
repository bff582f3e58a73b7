//! Graph builder
//!
//! Extracts capped citation and co-authorship graphs from the snapshot for
//! force-directed rendering. Node selection is deterministic (count
//! descending, id ascending) and every node carries a connected-component
//! cluster id.

pub mod cluster;

pub use cluster::{ClusterSummary, TOP_CLUSTERS};

use crate::analytics::{paper_counts, pair_weights};
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MAX_NODES: usize = 200;
pub const DEFAULT_MAX_AUTHORS: usize = 150;

const TITLE_CHARS: usize = 100;
const NAME_CHARS: usize = 50;

/// Graph payload: nodes, links and the largest clusters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGraph<N, L> {
    pub nodes: Vec<N>,
    pub links: Vec<L>,
    pub clusters: Vec<ClusterSummary>,
}

impl<N, L> NetworkGraph<N, L> {
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            clusters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperNode {
    pub id: String,
    pub year: Option<i32>,
    pub cited_by_count: u64,
    pub patent_count: u64,
    pub title: String,
    pub cluster: usize,
}

/// Directed citation: `source` cites `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorNode {
    pub id: String,
    pub name: String,
    pub paper_count: usize,
    pub h_index: f64,
    pub cluster: usize,
}

/// Undirected co-authorship with `source < target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationLink {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

pub type CitationGraph = NetworkGraph<PaperNode, CitationLink>;
pub type CollaborationGraph = NetworkGraph<AuthorNode, CollaborationLink>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationGraphParams {
    pub max_nodes: usize,
    /// Only papers published in or after this year
    pub start_year: Option<i32>,
}

impl Default for CitationGraphParams {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            start_year: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaborationGraphParams {
    pub max_authors: usize,
    /// Only count papers published in or after this year
    pub start_year: Option<i32>,
}

impl Default for CollaborationGraphParams {
    fn default() -> Self {
        Self {
            max_authors: DEFAULT_MAX_AUTHORS,
            start_year: None,
        }
    }
}

fn in_window(year: Option<i32>, start_year: Option<i32>) -> bool {
    match start_year {
        None => true,
        Some(start) => year.map_or(false, |y| y >= start),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Most cited papers and the citations among them
pub fn citation_graph(ds: &Dataset, params: CitationGraphParams) -> CitationGraph {
    let mut candidates: Vec<usize> = (0..ds.papers().len())
        .filter(|&p| in_window(ds.papers()[p].year, params.start_year))
        .collect();

    candidates.sort_by(|&a, &b| {
        let (pa, pb) = (&ds.papers()[a], &ds.papers()[b]);
        pb.cited_by_count
            .cmp(&pa.cited_by_count)
            .then_with(|| pa.id.cmp(&pb.id))
    });
    candidates.truncate(params.max_nodes);

    if candidates.is_empty() {
        return NetworkGraph::empty();
    }

    let node_of: HashMap<usize, usize> = candidates
        .iter()
        .enumerate()
        .map(|(node, &paper)| (paper, node))
        .collect();

    let mut edges = Vec::new();
    let mut links = Vec::new();
    for citation in ds.references() {
        let citing = ds.paper_position(&citation.citing).and_then(|p| node_of.get(&p));
        let cited = ds.paper_position(&citation.cited).and_then(|p| node_of.get(&p));
        if let (Some(&a), Some(&b)) = (citing, cited) {
            edges.push((a, b));
            links.push(CitationLink {
                source: citation.citing.clone(),
                target: citation.cited.clone(),
            });
        }
    }

    let clusters = cluster::assign_clusters(candidates.len(), &edges);

    let nodes = candidates
        .iter()
        .zip(clusters.iter())
        .map(|(&p, &cluster)| {
            let paper = &ds.papers()[p];
            PaperNode {
                id: paper.id.clone(),
                year: paper.year,
                cited_by_count: paper.cited_by_count,
                patent_count: paper.patent_count,
                title: truncate(paper.title.as_deref().unwrap_or_default(), TITLE_CHARS),
                cluster,
            }
        })
        .collect();

    tracing::debug!(
        nodes = candidates.len(),
        links = links.len(),
        "Built citation graph"
    );

    NetworkGraph {
        nodes,
        links,
        clusters: cluster::cluster_summary(&clusters, TOP_CLUSTERS),
    }
}

/// Most prolific authors and their co-authorship links
pub fn collaboration_graph(ds: &Dataset, params: CollaborationGraphParams) -> CollaborationGraph {
    let keep_paper = |p: usize| in_window(ds.papers()[p].year, params.start_year);

    let counts = paper_counts(ds, keep_paper);
    let mut candidates: Vec<(usize, usize)> = counts.into_iter().filter(|&(_, c)| c > 0).collect();
    candidates.sort_by(|(a, ca), (b, cb)| {
        cb.cmp(ca)
            .then_with(|| ds.authors()[*a].id.cmp(&ds.authors()[*b].id))
    });
    candidates.truncate(params.max_authors);

    if candidates.is_empty() {
        return NetworkGraph::empty();
    }

    let node_of: HashMap<usize, usize> = candidates
        .iter()
        .enumerate()
        .map(|(node, &(author, _))| (author, node))
        .collect();

    let weights = pair_weights(ds, keep_paper, |a| node_of.contains_key(&a));

    let mut links: Vec<(usize, usize, CollaborationLink)> = weights
        .into_iter()
        .map(|((a, b), weight)| {
            let (x, y) = if ds.authors()[a].id <= ds.authors()[b].id { (a, b) } else { (b, a) };
            (
                node_of[&x],
                node_of[&y],
                CollaborationLink {
                    source: ds.authors()[x].id.clone(),
                    target: ds.authors()[y].id.clone(),
                    weight,
                },
            )
        })
        .collect();
    links.sort_by(|(_, _, l), (_, _, r)| (&l.source, &l.target).cmp(&(&r.source, &r.target)));

    let edges: Vec<(usize, usize)> = links.iter().map(|&(a, b, _)| (a, b)).collect();
    let clusters = cluster::assign_clusters(candidates.len(), &edges);

    let nodes = candidates
        .iter()
        .zip(clusters.iter())
        .map(|(&(a, paper_count), &cluster)| {
            let author = &ds.authors()[a];
            AuthorNode {
                id: author.id.clone(),
                name: truncate(&author.display_name, NAME_CHARS),
                paper_count,
                h_index: ds.stats_at(a).h_index,
                cluster,
            }
        })
        .collect();

    tracing::debug!(
        nodes = candidates.len(),
        links = links.len(),
        "Built collaboration graph"
    );

    NetworkGraph {
        nodes,
        links: links.into_iter().map(|(_, _, link)| link).collect(),
        clusters: cluster::cluster_summary(&clusters, TOP_CLUSTERS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{fixtures, Affiliation, Author, Paper};
    use std::collections::HashSet;

    fn node_ids<N, L>(graph: &NetworkGraph<N, L>, id: impl Fn(&N) -> &str) -> HashSet<String> {
        graph.nodes.iter().map(|n| id(n).to_string()).collect()
    }

    #[test]
    fn test_citation_graph_links_stay_inside_nodes() {
        let ds = fixtures::sample();

        for max_nodes in 1..=10 {
            let graph = citation_graph(&ds, CitationGraphParams { max_nodes, start_year: None });
            assert!(graph.nodes.len() <= max_nodes);

            let ids = node_ids(&graph, |n: &PaperNode| n.id.as_str());
            for link in &graph.links {
                assert!(ids.contains(&link.source) && ids.contains(&link.target));
            }
        }
    }

    #[test]
    fn test_citation_graph_returns_everything_when_cap_is_large() {
        let ds = fixtures::sample();
        let graph = citation_graph(&ds, CitationGraphParams { max_nodes: 500, start_year: None });
        assert_eq!(graph.nodes.len(), ds.papers().len());
        // dangling p1->p99 never loaded; self-citation kept
        assert_eq!(graph.links.len(), 6);
    }

    #[test]
    fn test_citation_graph_selection_order() {
        let ds = fixtures::sample();
        let graph = citation_graph(&ds, CitationGraphParams { max_nodes: 3, start_year: None });

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        // p2 and p3 tie on 8 citations; id breaks the tie
        assert_eq!(ids, vec!["p6", "p1", "p2"]);
        assert_eq!(graph.links, vec![CitationLink { source: "p2".into(), target: "p1".into() }]);
        assert_eq!(graph.nodes[0].title, "");
        assert_eq!(graph.nodes[1].title, "Deep Graph Learning");
    }

    #[test]
    fn test_citation_graph_clusters_partition_nodes() {
        let ds = fixtures::sample();
        let graph = citation_graph(&ds, CitationGraphParams::default());

        let cluster_of: HashMap<&str, usize> =
            graph.nodes.iter().map(|n| (n.id.as_str(), n.cluster)).collect();

        // Components: {p6, p7}, {p1, p2, p3}, {p4, p5}
        assert_eq!(cluster_of["p1"], cluster_of["p3"]);
        assert_eq!(cluster_of["p6"], cluster_of["p7"]);
        assert_eq!(cluster_of["p4"], cluster_of["p5"]);
        assert_ne!(cluster_of["p1"], cluster_of["p4"]);
        assert_ne!(cluster_of["p1"], cluster_of["p6"]);

        // p6 is the first seed
        assert_eq!(cluster_of["p6"], 0);
        assert_eq!(graph.clusters[0].size, 3);
        assert_eq!(graph.clusters.iter().map(|c| c.size).sum::<usize>(), graph.nodes.len());
    }

    #[test]
    fn test_citation_graph_start_year() {
        let ds = fixtures::sample();
        let graph = citation_graph(&ds, CitationGraphParams { max_nodes: 50, start_year: Some(2021) });
        let ids = node_ids(&graph, |n: &PaperNode| n.id.as_str());
        let expected: HashSet<String> = ["p4", "p5", "p7"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_citation_graph_title_is_trimmed() {
        let long = "x".repeat(250);
        let ds = Dataset::from_tables(
            vec![Paper::new("p", Some(2020), 1, 0).with_title(long)],
            vec![],
            vec![],
            vec![],
        );
        let graph = citation_graph(&ds, CitationGraphParams::default());
        assert_eq!(graph.nodes[0].title.chars().count(), 100);
    }

    #[test]
    fn test_empty_graphs() {
        let ds = fixtures::empty();
        let citations = citation_graph(&ds, CitationGraphParams::default());
        assert!(citations.nodes.is_empty() && citations.links.is_empty() && citations.clusters.is_empty());

        let collaborations = collaboration_graph(&ds, CollaborationGraphParams::default());
        assert!(collaborations.nodes.is_empty() && collaborations.links.is_empty());
    }

    #[test]
    fn test_collaboration_graph_weights() {
        let ds = fixtures::sample();
        let graph = collaboration_graph(&ds, CollaborationGraphParams::default());

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3", "a4"]);

        let links: Vec<(&str, &str, u64)> = graph
            .links
            .iter()
            .map(|l| (l.source.as_str(), l.target.as_str(), l.weight))
            .collect();
        assert_eq!(
            links,
            vec![("a1", "a2", 2), ("a1", "a3", 1), ("a1", "a4", 1), ("a2", "a3", 1)]
        );
        assert!(graph.nodes.iter().all(|n| n.cluster == 0));
        assert_eq!(graph.clusters[0].percentage, 100.0);
    }

    #[test]
    fn test_collaboration_graph_cap_drops_edges_to_unselected() {
        let ds = fixtures::sample();
        let graph = collaboration_graph(&ds, CollaborationGraphParams { max_authors: 2, start_year: None });

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].weight, 2);
    }

    #[test]
    fn test_collaboration_graph_start_year_restricts_counts() {
        let ds = fixtures::sample();
        let graph = collaboration_graph(&ds, CollaborationGraphParams { max_authors: 10, start_year: Some(2020) });

        let counts: HashMap<&str, usize> =
            graph.nodes.iter().map(|n| (n.id.as_str(), n.paper_count)).collect();
        // p1 (2019) and p6 (unknown year) drop out
        assert_eq!(counts["a1"], 2);
        assert_eq!(counts["a2"], 1);
        assert_eq!(counts["a3"], 2);

        let a1_a2 = graph.links.iter().find(|l| l.source == "a1" && l.target == "a2").unwrap();
        assert_eq!(a1_a2.weight, 1);
    }

    #[test]
    fn test_collaboration_weight_counts_distinct_papers() {
        let ds = Dataset::from_tables(
            vec![Paper::new("p1", None, 0, 0), Paper::new("p2", None, 0, 0), Paper::new("p3", None, 0, 0)],
            vec![],
            vec![Author::new("x", "X"), Author::new("y", "Y").with_h_index(2.0), Author::new("z", &"z".repeat(80))],
            vec![
                Affiliation::new("p1", "x"),
                Affiliation::new("p1", "y"),
                Affiliation::new("p1", "y"),
                Affiliation::new("p2", "y"),
                Affiliation::new("p2", "x"),
                Affiliation::new("p3", "z"),
            ],
        );
        let graph = collaboration_graph(&ds, CollaborationGraphParams::default());

        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].weight, 2);
        let z = graph.nodes.iter().find(|n| n.id == "z").unwrap();
        assert_eq!(z.name.chars().count(), 50);
        assert_ne!(z.cluster, graph.nodes[0].cluster);
    }
}
