//! Author rankings and co-authorship statistics

use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Ranking key for [`top_authors`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorMetric {
    #[default]
    PaperCount,
    HIndex,
    Productivity,
}

impl AuthorMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorMetric::PaperCount => "paper_count",
            AuthorMetric::HIndex => "h_index",
            AuthorMetric::Productivity => "productivity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRanking {
    pub rank: usize,
    pub author_id: String,
    pub display_name: String,
    pub paper_count: usize,
    pub h_index: f64,
    pub productivity: f64,
}

/// Most frequent co-author pair; `author_a < author_b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPair {
    pub author_a: String,
    pub author_b: String,
    pub name_a: String,
    pub name_b: String,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationStats {
    /// Distinct unordered co-author pairs
    pub total_collaborations: u64,
    pub mean_weight: Option<f64>,
    pub top_pair: Option<TopPair>,
    /// Authors with at least one paper
    pub total_authors: u64,
    pub mean_authors_per_paper: Option<f64>,
    pub max_authors_on_paper: u64,
    pub single_author_papers: u64,
    pub multi_author_papers: u64,
}

/// Top `n` authors ranked by `metric`.
///
/// Ties on the metric fall back to the other count (paper count, or h-index
/// for the paper-count ranking) and finally to the author id, so the order
/// is total.
pub fn top_authors(ds: &Dataset, n: usize, metric: AuthorMetric) -> Vec<AuthorRanking> {
    let mut ranked: Vec<(usize, _)> = (0..ds.authors().len()).map(|i| (i, ds.stats_at(i))).collect();

    ranked.sort_by(|(ia, a), (ib, b)| {
        let primary = match metric {
            AuthorMetric::PaperCount => b
                .paper_count
                .cmp(&a.paper_count)
                .then_with(|| b.h_index.total_cmp(&a.h_index)),
            AuthorMetric::HIndex => b
                .h_index
                .total_cmp(&a.h_index)
                .then_with(|| b.paper_count.cmp(&a.paper_count)),
            AuthorMetric::Productivity => b
                .productivity
                .total_cmp(&a.productivity)
                .then_with(|| b.paper_count.cmp(&a.paper_count)),
        };
        primary.then_with(|| ds.authors()[*ia].id.cmp(&ds.authors()[*ib].id))
    });

    ranked
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(rank, (i, stats))| {
            let author = &ds.authors()[i];
            AuthorRanking {
                rank: rank + 1,
                author_id: author.id.clone(),
                display_name: author.display_name.clone(),
                paper_count: stats.paper_count,
                h_index: stats.h_index,
                productivity: stats.productivity,
            }
        })
        .collect()
}

/// Co-authorship summary over every paper
pub fn collaboration_stats(ds: &Dataset) -> CollaborationStats {
    let weights = pair_weights(ds, |_| true, |_| true);

    let total_collaborations = weights.len() as u64;
    let weight_sum: u64 = weights.values().sum();
    let mean_weight = (total_collaborations > 0).then(|| weight_sum as f64 / total_collaborations as f64);

    let top_pair = weights
        .iter()
        .map(|(&(a, b), &w)| {
            let (x, y) = ordered_by_id(ds, a, b);
            (x, y, w)
        })
        .max_by(|(xa, ya, wa), (xb, yb, wb)| {
            wa.cmp(wb).then_with(|| {
                // Smaller ids win ties, so they must compare greater here
                let ka = (&ds.authors()[*xa].id, &ds.authors()[*ya].id);
                let kb = (&ds.authors()[*xb].id, &ds.authors()[*yb].id);
                kb.cmp(&ka)
            })
        })
        .map(|(x, y, weight)| TopPair {
            author_a: ds.authors()[x].id.clone(),
            author_b: ds.authors()[y].id.clone(),
            name_a: ds.authors()[x].display_name.clone(),
            name_b: ds.authors()[y].display_name.clone(),
            weight,
        });

    let per_paper: Vec<u64> = (0..ds.papers().len())
        .map(|p| ds.author_positions_of_paper(p).len() as u64)
        .filter(|&count| count > 0)
        .collect();
    let authored_papers = per_paper.len() as u64;

    CollaborationStats {
        total_collaborations,
        mean_weight,
        top_pair,
        total_authors: (0..ds.authors().len())
            .filter(|&a| ds.stats_at(a).paper_count > 0)
            .count() as u64,
        mean_authors_per_paper: (authored_papers > 0)
            .then(|| per_paper.iter().sum::<u64>() as f64 / authored_papers as f64),
        max_authors_on_paper: per_paper.iter().copied().max().unwrap_or(0),
        single_author_papers: per_paper.iter().filter(|&&c| c == 1).count() as u64,
        multi_author_papers: per_paper.iter().filter(|&&c| c > 1).count() as u64,
    }
}

/// Co-authorship weights between author positions.
///
/// Keys are `(lower position, higher position)`; the value is the number of
/// distinct papers accepted by `keep_paper` on which both authors accepted
/// by `keep_author` appear.
pub(crate) fn pair_weights<P, A>(ds: &Dataset, keep_paper: P, keep_author: A) -> BTreeMap<(usize, usize), u64>
where
    P: Fn(usize) -> bool,
    A: Fn(usize) -> bool,
{
    let mut weights: BTreeMap<(usize, usize), u64> = BTreeMap::new();

    for paper in (0..ds.papers().len()).filter(|&p| keep_paper(p)) {
        let members: Vec<usize> = ds
            .author_positions_of_paper(paper)
            .iter()
            .copied()
            .filter(|&a| keep_author(a))
            .collect();

        // Positions are sorted and distinct per paper
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                *weights.entry((a, b)).or_default() += 1;
            }
        }
    }

    weights
}

fn ordered_by_id(ds: &Dataset, a: usize, b: usize) -> (usize, usize) {
    match ds.authors()[a].id.cmp(&ds.authors()[b].id) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    }
}

/// Paper counts per author position restricted to the accepted papers
pub(crate) fn paper_counts<P>(ds: &Dataset, keep_paper: P) -> HashMap<usize, usize>
where
    P: Fn(usize) -> bool,
{
    let mut counts = HashMap::new();
    for paper in (0..ds.papers().len()).filter(|&p| keep_paper(p)) {
        for &a in ds.author_positions_of_paper(paper) {
            *counts.entry(a).or_default() += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{fixtures, Affiliation, Author, Paper};

    #[test]
    fn test_top_authors_ordering() {
        let ds = fixtures::sample();
        let top = top_authors(&ds, 5, AuthorMetric::PaperCount);

        let ids: Vec<&str> = top.iter().map(|a| a.author_id.as_str()).collect();
        // a1 and a2 both have 3 papers; a1's stored h-index (9) beats a2's derived 3
        assert_eq!(ids, vec!["a1", "a2", "a3", "a4", "a5"]);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[1].h_index, 3.0);

        for pair in top.windows(2) {
            let (x, y) = (&pair[0], &pair[1]);
            let ordered = x.paper_count > y.paper_count
                || (x.paper_count == y.paper_count && x.h_index > y.h_index)
                || (x.paper_count == y.paper_count && x.h_index == y.h_index && x.author_id < y.author_id);
            assert!(ordered, "{:?} before {:?}", x.author_id, y.author_id);
        }
    }

    #[test]
    fn test_top_authors_truncates() {
        let ds = fixtures::sample();
        assert_eq!(top_authors(&ds, 2, AuthorMetric::PaperCount).len(), 2);
        assert_eq!(top_authors(&ds, 50, AuthorMetric::PaperCount).len(), 5);
        assert!(top_authors(&fixtures::empty(), 5, AuthorMetric::PaperCount).is_empty());
    }

    #[test]
    fn test_top_authors_full_tie_breaks_on_id() {
        let ds = Dataset::from_tables(
            vec![Paper::new("p", Some(2020), 1, 0)],
            vec![],
            vec![Author::new("b", "B"), Author::new("a", "A")],
            vec![Affiliation::new("p", "b"), Affiliation::new("p", "a")],
        );
        let ids: Vec<String> = top_authors(&ds, 2, AuthorMetric::PaperCount)
            .into_iter()
            .map(|a| a.author_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_top_authors_alternate_metrics() {
        let ds = fixtures::sample();

        let by_h: Vec<String> = top_authors(&ds, 3, AuthorMetric::HIndex)
            .into_iter()
            .map(|a| a.author_id)
            .collect();
        assert_eq!(by_h, vec!["a1", "a2", "a3"]);

        let by_productivity = top_authors(&ds, 1, AuthorMetric::Productivity);
        assert_eq!(by_productivity[0].author_id, "a4");
        assert_eq!(by_productivity[0].productivity, 1.5);
    }

    #[test]
    fn test_collaboration_weights_match_shared_papers() {
        let ds = fixtures::sample();
        let weights = pair_weights(&ds, |_| true, |_| true);

        let by_id: BTreeMap<(String, String), u64> = weights
            .iter()
            .map(|(&(a, b), &w)| {
                let (x, y) = ordered_by_id(&ds, a, b);
                ((ds.authors()[x].id.clone(), ds.authors()[y].id.clone()), w)
            })
            .collect();

        let expected: BTreeMap<(String, String), u64> = [
            (("a1", "a2"), 2),
            (("a1", "a3"), 1),
            (("a1", "a4"), 1),
            (("a2", "a3"), 1),
        ]
        .into_iter()
        .map(|((a, b), w)| ((a.to_string(), b.to_string()), w))
        .collect();

        assert_eq!(by_id, expected);
    }

    #[test]
    fn test_collaboration_stats() {
        let stats = collaboration_stats(&fixtures::sample());

        assert_eq!(stats.total_collaborations, 4);
        assert_eq!(stats.mean_weight, Some(1.25));
        let top = stats.top_pair.unwrap();
        assert_eq!((top.author_a.as_str(), top.author_b.as_str(), top.weight), ("a1", "a2", 2));
        assert_eq!(top.name_b, "Alan Turing");

        assert_eq!(stats.total_authors, 4);
        assert_eq!(stats.max_authors_on_paper, 3);
        assert_eq!(stats.single_author_papers, 3);
        assert_eq!(stats.multi_author_papers, 3);
        let mean = stats.mean_authors_per_paper.unwrap();
        assert!((mean - 10.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_collaboration_stats_tie_prefers_smaller_ids() {
        let ds = Dataset::from_tables(
            vec![Paper::new("p1", None, 0, 0), Paper::new("p2", None, 0, 0)],
            vec![],
            vec![Author::new("z", "Z"), Author::new("y", "Y"), Author::new("b", "B"), Author::new("a", "A")],
            vec![
                Affiliation::new("p1", "z"),
                Affiliation::new("p1", "y"),
                Affiliation::new("p2", "b"),
                Affiliation::new("p2", "a"),
            ],
        );
        let top = collaboration_stats(&ds).top_pair.unwrap();
        assert_eq!((top.author_a.as_str(), top.author_b.as_str()), ("a", "b"));
    }

    #[test]
    fn test_collaboration_stats_empty() {
        let stats = collaboration_stats(&fixtures::empty());
        assert_eq!(stats.total_collaborations, 0);
        assert_eq!(stats.mean_weight, None);
        assert_eq!(stats.top_pair, None);
        assert_eq!(stats.mean_authors_per_paper, None);
    }
}
