//! Aggregation engine
//!
//! Stateless functions over a [`Dataset`] snapshot. Every function is
//! deterministic and total: empty inputs produce empty series or
//! zero/null statistics, never an error. Papers with an unknown year are
//! left out of every year-bucketed aggregate.

mod authors;

pub use authors::{
    collaboration_stats, top_authors, AuthorMetric, AuthorRanking, CollaborationStats, TopPair,
};
pub(crate) use authors::{paper_counts, pair_weights};

use crate::dataset::{Dataset, Paper};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default page size for per-year paper listings
pub const DEFAULT_YEAR_LISTING_LIMIT: usize = 100;

/// Inclusive year bounds; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl YearRange {
    pub fn new(start: Option<i32>, end: Option<i32>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_year(start: i32) -> Self {
        Self::new(Some(start), None)
    }

    /// Whether a known year falls inside the bounds
    pub fn contains(&self, year: i32) -> bool {
        self.start.map_or(true, |s| year >= s) && self.end.map_or(true, |e| year <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub year: i32,
    pub paper_count: u64,
    pub total_citations: u64,
    pub total_patents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentBucket {
    pub patent_count: u64,
    pub paper_count: u64,
}

/// Citation summary over a (possibly year-filtered) paper set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationStats {
    pub total_papers: u64,
    pub total_citations: u64,
    pub mean_citations: Option<f64>,
    pub median_citations: Option<f64>,
    pub max_citations: u64,
    pub zero_citation_count: u64,
    /// Citation rows whose citing paper is in the set
    pub internal_citations: u64,
    pub papers_with_patents: u64,
    pub total_patent_citations: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    #[default]
    Papers,
    Citations,
    Patents,
}

impl TrendMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendMetric::Papers => "papers",
            TrendMetric::Citations => "citations",
            TrendMetric::Patents => "patents",
        }
    }

    fn value_of(&self, paper: &Paper) -> u64 {
        match self {
            TrendMetric::Papers => 1,
            TrendMetric::Citations => paper.cited_by_count,
            TrendMetric::Patents => paper.patent_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub metric: TrendMetric,
    pub value: u64,
    /// Percent change against the previous year in the series; null for
    /// the first year and after a zero value
    pub pct_change: Option<f64>,
}

/// Filters for paper listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperFilter {
    pub year: Option<i32>,
    pub min_citations: Option<u64>,
    pub has_patents: Option<bool>,
    pub limit: usize,
}

impl PaperFilter {
    fn matches(&self, paper: &Paper) -> bool {
        if let Some(year) = self.year {
            if paper.year != Some(year) {
                return false;
            }
        }
        if let Some(min) = self.min_citations {
            if paper.cited_by_count < min {
                return false;
            }
        }
        match self.has_patents {
            Some(true) => paper.patent_count > 0,
            Some(false) => paper.patent_count == 0,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub paperid: String,
    pub year: Option<i32>,
    pub cited_by_count: u64,
    pub patent_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&Paper> for PaperSummary {
    fn from(paper: &Paper) -> Self {
        Self {
            paperid: paper.id.clone(),
            year: paper.year,
            cited_by_count: paper.cited_by_count,
            patent_count: paper.patent_count,
            title: paper.title.clone(),
        }
    }
}

/// Per-year paper count, citation sum and patent sum, ascending by year.
///
/// Only years that have at least one paper appear.
pub fn timeline(ds: &Dataset, range: YearRange) -> Vec<TimelineEntry> {
    let mut buckets: BTreeMap<i32, TimelineEntry> = BTreeMap::new();

    for paper in ds.papers() {
        let Some(year) = paper.year else { continue };
        if !range.contains(year) {
            continue;
        }
        let entry = buckets.entry(year).or_insert_with(|| TimelineEntry {
            year,
            paper_count: 0,
            total_citations: 0,
            total_patents: 0,
        });
        entry.paper_count += 1;
        entry.total_citations += paper.cited_by_count;
        entry.total_patents += paper.patent_count;
    }

    buckets.into_values().collect()
}

/// Papers grouped by patent-citation count, ascending.
///
/// `year` restricts the paper set first. With `with_patents_only` the
/// zero bucket is hidden; otherwise bucket counts sum to the papers
/// considered.
pub fn patent_histogram(ds: &Dataset, year: Option<i32>, with_patents_only: bool) -> Vec<PatentBucket> {
    let mut buckets: BTreeMap<u64, u64> = BTreeMap::new();

    for paper in papers_in(ds, year) {
        if with_patents_only && paper.patent_count == 0 {
            continue;
        }
        *buckets.entry(paper.patent_count).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|(patent_count, paper_count)| PatentBucket {
            patent_count,
            paper_count,
        })
        .collect()
}

/// Citation statistics over all papers, or over one year's papers
pub fn citation_stats(ds: &Dataset, year: Option<i32>) -> CitationStats {
    let selected: Vec<&Paper> = papers_in(ds, year).collect();

    let mut counts: Vec<u64> = selected.iter().map(|p| p.cited_by_count).collect();
    counts.sort_unstable();

    let total_citations: u64 = counts.iter().sum();
    let n = counts.len();

    let mean_citations = (n > 0).then(|| total_citations as f64 / n as f64);
    let median_citations = match n {
        0 => None,
        _ if n % 2 == 1 => Some(counts[n / 2] as f64),
        _ => Some((counts[n / 2 - 1] as f64 + counts[n / 2] as f64) / 2.0),
    };

    let internal_citations = match year {
        None => ds.references().len() as u64,
        Some(_) => {
            let ids: HashSet<&str> = selected.iter().map(|p| p.id.as_str()).collect();
            ds.references()
                .iter()
                .filter(|c| ids.contains(c.citing.as_str()))
                .count() as u64
        }
    };

    CitationStats {
        total_papers: n as u64,
        total_citations,
        mean_citations,
        median_citations,
        max_citations: counts.last().copied().unwrap_or(0),
        zero_citation_count: counts.iter().take_while(|&&c| c == 0).count() as u64,
        internal_citations,
        papers_with_patents: selected.iter().filter(|p| p.patent_count > 0).count() as u64,
        total_patent_citations: selected.iter().map(|p| p.patent_count).sum(),
    }
}

/// Per-year value of `metric` with percent change from the previous year
/// present in the series
pub fn yearly_trend(ds: &Dataset, metric: TrendMetric, range: YearRange) -> Vec<TrendPoint> {
    let mut values: BTreeMap<i32, u64> = BTreeMap::new();
    for paper in ds.papers() {
        let Some(year) = paper.year else { continue };
        if range.contains(year) {
            *values.entry(year).or_default() += metric.value_of(paper);
        }
    }

    let mut previous: Option<u64> = None;
    values
        .into_iter()
        .map(|(year, value)| {
            let pct_change = match previous {
                Some(prev) if prev > 0 => Some((value as f64 - prev as f64) / prev as f64 * 100.0),
                _ => None,
            };
            previous = Some(value);
            TrendPoint {
                year,
                metric,
                value,
                pct_change,
            }
        })
        .collect()
}

/// Papers matching `filter`, most cited first (id ascending on ties)
pub fn papers_with_filters(ds: &Dataset, filter: &PaperFilter) -> Vec<PaperSummary> {
    let mut matched: Vec<&Paper> = ds.papers().iter().filter(|p| filter.matches(p)).collect();
    matched.sort_by(|a, b| {
        b.cited_by_count
            .cmp(&a.cited_by_count)
            .then_with(|| a.id.cmp(&b.id))
    });
    matched
        .into_iter()
        .take(filter.limit)
        .map(PaperSummary::from)
        .collect()
}

/// Papers of a single year, most cited first
pub fn papers_in_year(ds: &Dataset, year: i32, limit: usize) -> Vec<PaperSummary> {
    papers_with_filters(
        ds,
        &PaperFilter {
            year: Some(year),
            limit,
            ..PaperFilter::default()
        },
    )
}

fn papers_in(ds: &Dataset, year: Option<i32>) -> impl Iterator<Item = &Paper> {
    ds.papers()
        .iter()
        .filter(move |p| year.map_or(true, |y| p.year == Some(y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures;

    #[test]
    fn test_three_paper_example() {
        let ds = fixtures::three_papers();

        let stats = citation_stats(&ds, None);
        assert_eq!(stats.total_papers, 3);
        assert_eq!(stats.total_citations, 15);
        assert_eq!(stats.mean_citations, Some(5.0));
        assert_eq!(stats.median_citations, Some(5.0));
        assert_eq!(stats.max_citations, 10);
        assert_eq!(stats.zero_citation_count, 1);

        let years: Vec<i32> = timeline(&ds, YearRange::all()).iter().map(|e| e.year).collect();
        assert_eq!(years, vec![2020, 2021]);
    }

    #[test]
    fn test_timeline_counts_every_dated_paper() {
        let ds = fixtures::sample();
        let entries = timeline(&ds, YearRange::all());

        let total: u64 = entries.iter().map(|e| e.paper_count).sum();
        let dated = ds.papers().iter().filter(|p| p.year.is_some()).count() as u64;
        assert_eq!(total, dated);

        let y2020 = entries.iter().find(|e| e.year == 2020).unwrap();
        assert_eq!(y2020.paper_count, 2);
        assert_eq!(y2020.total_citations, 16);
        assert_eq!(y2020.total_patents, 1);
    }

    #[test]
    fn test_timeline_range_is_inclusive() {
        let ds = fixtures::sample();
        let years: Vec<i32> = timeline(&ds, YearRange::new(Some(2020), Some(2021)))
            .iter()
            .map(|e| e.year)
            .collect();
        assert_eq!(years, vec![2020, 2021]);
    }

    #[test]
    fn test_patent_histogram_sums_to_considered_papers() {
        let ds = fixtures::sample();

        let all = patent_histogram(&ds, None, false);
        let total: u64 = all.iter().map(|b| b.paper_count).sum();
        assert_eq!(total, ds.papers().len() as u64);
        assert_eq!(all[0], PatentBucket { patent_count: 0, paper_count: 4 });

        let in_2021 = patent_histogram(&ds, Some(2021), false);
        let total: u64 = in_2021.iter().map(|b| b.paper_count).sum();
        assert_eq!(total, 2);

        let counts: Vec<u64> = all.iter().map(|b| b.patent_count).collect();
        let mut sorted = counts.clone();
        sorted.sort_unstable();
        assert_eq!(counts, sorted);
    }

    #[test]
    fn test_patent_histogram_can_hide_zero_bucket() {
        let ds = fixtures::sample();
        let buckets = patent_histogram(&ds, None, true);
        assert!(buckets.iter().all(|b| b.patent_count > 0));
        assert_eq!(buckets.iter().map(|b| b.paper_count).sum::<u64>(), 3);
    }

    #[test]
    fn test_citation_stats_empty_is_zero_and_null() {
        let stats = citation_stats(&fixtures::empty(), None);
        assert_eq!(stats.total_papers, 0);
        assert_eq!(stats.mean_citations, None);
        assert_eq!(stats.median_citations, None);
        assert_eq!(stats.max_citations, 0);

        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn test_citation_stats_year_filter() {
        let ds = fixtures::sample();
        let stats = citation_stats(&ds, Some(2020));
        assert_eq!(stats.total_papers, 2);
        assert_eq!(stats.median_citations, Some(8.0));
        // p3 cites p1 and p2, p2 cites p1
        assert_eq!(stats.internal_citations, 3);

        let none = citation_stats(&ds, Some(1999));
        assert_eq!(none.total_papers, 0);
        assert_eq!(none.internal_citations, 0);
    }

    #[test]
    fn test_citation_stats_even_median() {
        let ds = fixtures::sample();
        let stats = citation_stats(&ds, Some(2021));
        assert_eq!(stats.median_citations, Some(1.5));
    }

    #[test]
    fn test_yearly_trend_pct_change() {
        let ds = fixtures::sample();
        let points = yearly_trend(&ds, TrendMetric::Papers, YearRange::all());

        let values: Vec<(i32, u64)> = points.iter().map(|p| (p.year, p.value)).collect();
        assert_eq!(values, vec![(2019, 1), (2020, 2), (2021, 2), (2022, 1)]);
        assert_eq!(points[0].pct_change, None);
        assert_eq!(points[1].pct_change, Some(100.0));
        assert_eq!(points[2].pct_change, Some(0.0));
        assert_eq!(points[3].pct_change, Some(-50.0));
    }

    #[test]
    fn test_yearly_trend_null_after_zero() {
        let ds = Dataset::from_tables(
            vec![
                Paper::new("x1", Some(2018), 0, 0),
                Paper::new("x2", Some(2019), 0, 4),
                Paper::new("x3", Some(2020), 0, 2),
            ],
            vec![],
            vec![],
            vec![],
        );
        let points = yearly_trend(&ds, TrendMetric::Patents, YearRange::all());
        assert_eq!(points[0].pct_change, None);
        assert_eq!(points[1].value, 4);
        assert_eq!(points[1].pct_change, None);
        assert_eq!(points[2].pct_change, Some(-50.0));

        let ds = fixtures::sample();
        let citations = yearly_trend(&ds, TrendMetric::Citations, YearRange::new(Some(2021), None));
        assert_eq!(citations[0].value, 3);
        // 2021 -> 2022 citations: 3 -> 1
        assert!((citations[1].pct_change.unwrap() + 66.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_papers_with_filters_order_and_limit() {
        let ds = fixtures::sample();
        let top = papers_with_filters(&ds, &PaperFilter { limit: 3, ..PaperFilter::default() });
        let ids: Vec<&str> = top.iter().map(|p| p.paperid.as_str()).collect();
        assert_eq!(ids, vec!["p6", "p1", "p2"]);

        let patented = papers_with_filters(
            &ds,
            &PaperFilter {
                has_patents: Some(true),
                min_citations: Some(5),
                limit: 20,
                ..PaperFilter::default()
            },
        );
        let ids: Vec<&str> = patented.iter().map(|p| p.paperid.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_papers_in_year() {
        let ds = fixtures::sample();
        let papers = papers_in_year(&ds, 2021, DEFAULT_YEAR_LISTING_LIMIT);
        let ids: Vec<&str> = papers.iter().map(|p| p.paperid.as_str()).collect();
        assert_eq!(ids, vec!["p5", "p4"]);
        assert!(papers_in_year(&ds, 1980, 10).is_empty());
    }
}
