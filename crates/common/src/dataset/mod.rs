//! Dataset store
//!
//! Loads the four tables of the citation snapshot (papers, paper
//! references, authors, paper-author affiliations) once at startup and
//! exposes them read-only. The snapshot is shared as `Arc<Dataset>` and
//! never mutated after construction, so concurrent readers need no locks.
//!
//! Dangling rows (citations or affiliations naming papers/authors that are
//! not in the snapshot) are dropped while building and counted in the
//! [`LoadReport`]. So are rows whose fields do not parse, such as a year
//! outside the `i32` range or a negative count.

mod models;

#[cfg(test)]
pub(crate) mod fixtures;

pub use models::{h_index_of, Affiliation, Author, AuthorStats, Citation, Paper};

use crate::config::DatasetConfig;
use crate::errors::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Counts gathered while building the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub papers: usize,
    pub references: usize,
    pub authors: usize,
    pub affiliations: usize,
    pub duplicate_papers: usize,
    pub duplicate_authors: usize,
    pub dangling_references: usize,
    pub dangling_affiliations: usize,
    pub duplicate_affiliations: usize,
    /// Rows skipped because a field failed to parse
    pub malformed_rows: usize,
}

/// Immutable, fully loaded snapshot of the four base tables
#[derive(Debug)]
pub struct Dataset {
    papers: Vec<Paper>,
    references: Vec<Citation>,
    authors: Vec<Author>,
    affiliations: Vec<Affiliation>,

    paper_index: HashMap<String, usize>,
    author_index: HashMap<String, usize>,

    /// paper position -> sorted author positions
    authors_by_paper: Vec<Vec<usize>>,
    /// author position -> sorted paper positions
    papers_by_author: Vec<Vec<usize>>,
    author_stats: Vec<AuthorStats>,

    report: LoadReport,
}

impl Dataset {
    /// Load all four tables from the configured directory.
    ///
    /// A missing table, or a file that is not a JSON array, fails the whole
    /// load; a partially loaded snapshot is never returned. Individual rows
    /// that fail to parse are skipped and counted.
    pub fn load(config: &DatasetConfig) -> Result<Self> {
        info!(data_dir = %config.data_dir.display(), "Loading dataset snapshot");

        let mut malformed = 0;
        let papers: Vec<Paper> = read_table("papers", &config.papers_path(), &mut malformed)?;
        let references: Vec<Citation> =
            read_table("paper_refs", &config.references_path(), &mut malformed)?;
        let authors: Vec<Author> = read_table("authors", &config.authors_path(), &mut malformed)?;
        let affiliations: Vec<Affiliation> = read_table(
            "paper_author_affiliation",
            &config.affiliations_path(),
            &mut malformed,
        )?;

        let mut dataset = Self::from_tables(papers, references, authors, affiliations);
        dataset.report.malformed_rows = malformed;
        let report = dataset.load_report();

        info!(
            papers = report.papers,
            references = report.references,
            authors = report.authors,
            affiliations = report.affiliations,
            "Dataset snapshot loaded"
        );
        if report.malformed_rows > 0 {
            warn!(malformed_rows = report.malformed_rows, "Dropped rows with unparsable fields");
        }
        if report.dangling_references + report.dangling_affiliations > 0 {
            warn!(
                dangling_references = report.dangling_references,
                dangling_affiliations = report.dangling_affiliations,
                "Dropped rows referencing unknown papers or authors"
            );
        }

        Ok(dataset)
    }

    /// Build a snapshot from in-memory tables, applying the same filtering
    /// and derivation as [`Dataset::load`].
    pub fn from_tables(
        papers: Vec<Paper>,
        references: Vec<Citation>,
        authors: Vec<Author>,
        affiliations: Vec<Affiliation>,
    ) -> Self {
        let mut report = LoadReport::default();

        let mut paper_index = HashMap::with_capacity(papers.len());
        let mut kept_papers = Vec::with_capacity(papers.len());
        for paper in papers {
            if paper_index.contains_key(&paper.id) {
                report.duplicate_papers += 1;
                continue;
            }
            paper_index.insert(paper.id.clone(), kept_papers.len());
            kept_papers.push(paper);
        }

        let mut author_index = HashMap::with_capacity(authors.len());
        let mut kept_authors = Vec::with_capacity(authors.len());
        for author in authors {
            if author_index.contains_key(&author.id) {
                report.duplicate_authors += 1;
                continue;
            }
            author_index.insert(author.id.clone(), kept_authors.len());
            kept_authors.push(author);
        }

        let total_references = references.len();
        let kept_references: Vec<Citation> = references
            .into_iter()
            .filter(|c| paper_index.contains_key(&c.citing) && paper_index.contains_key(&c.cited))
            .collect();
        report.dangling_references = total_references - kept_references.len();

        // Affiliations: drop dangling rows, collapse duplicate pairs
        let mut seen: BTreeSet<(usize, usize)> = BTreeSet::new();
        let mut kept_affiliations = Vec::with_capacity(affiliations.len());
        for row in affiliations {
            match (paper_index.get(&row.paper_id), author_index.get(&row.author_id)) {
                (Some(&p), Some(&a)) => {
                    if seen.insert((p, a)) {
                        kept_affiliations.push(row);
                    } else {
                        report.duplicate_affiliations += 1;
                    }
                }
                _ => report.dangling_affiliations += 1,
            }
        }

        let mut authors_by_paper = vec![Vec::new(); kept_papers.len()];
        let mut papers_by_author = vec![Vec::new(); kept_authors.len()];
        for &(p, a) in &seen {
            authors_by_paper[p].push(a);
            papers_by_author[a].push(p);
        }
        for list in authors_by_paper.iter_mut() {
            list.sort_unstable();
        }

        let author_stats = kept_authors
            .iter()
            .zip(papers_by_author.iter())
            .map(|(author, papers)| {
                let h_index = author.h_index.unwrap_or_else(|| {
                    h_index_of(papers.iter().map(|&p| kept_papers[p].cited_by_count).collect())
                });
                AuthorStats {
                    paper_count: papers.len(),
                    h_index: sanitize(h_index),
                    productivity: sanitize(author.productivity.unwrap_or(0.0)),
                }
            })
            .collect();

        report.papers = kept_papers.len();
        report.references = kept_references.len();
        report.authors = kept_authors.len();
        report.affiliations = kept_affiliations.len();

        Self {
            papers: kept_papers,
            references: kept_references,
            authors: kept_authors,
            affiliations: kept_affiliations,
            paper_index,
            author_index,
            authors_by_paper,
            papers_by_author,
            author_stats,
            report,
        }
    }

    /// All papers, in load order
    pub fn papers(&self) -> &[Paper] {
        &self.papers
    }

    /// Citation rows whose endpoints are both loaded papers
    pub fn references(&self) -> &[Citation] {
        &self.references
    }

    pub fn authors(&self) -> &[Author] {
        &self.authors
    }

    /// Distinct (paper, author) rows whose endpoints are both loaded
    pub fn affiliations(&self) -> &[Affiliation] {
        &self.affiliations
    }

    pub fn paper(&self, id: &str) -> Option<&Paper> {
        self.paper_index.get(id).map(|&i| &self.papers[i])
    }

    pub fn author(&self, id: &str) -> Option<&Author> {
        self.author_index.get(id).map(|&i| &self.authors[i])
    }

    /// Derived aggregates for an author
    pub fn author_stats(&self, id: &str) -> Option<AuthorStats> {
        self.author_index.get(id).map(|&i| self.author_stats[i])
    }

    /// Authors of a paper, ordered by load position
    pub fn authors_of(&self, paper_id: &str) -> Vec<&Author> {
        self.paper_index
            .get(paper_id)
            .map(|&p| self.authors_by_paper[p].iter().map(|&a| &self.authors[a]).collect())
            .unwrap_or_default()
    }

    /// Papers of an author, ordered by load position
    pub fn papers_of(&self, author_id: &str) -> Vec<&Paper> {
        self.author_index
            .get(author_id)
            .map(|&a| {
                let mut positions = self.papers_by_author[a].clone();
                positions.sort_unstable();
                positions.into_iter().map(|p| &self.papers[p]).collect()
            })
            .unwrap_or_default()
    }

    pub fn load_report(&self) -> LoadReport {
        self.report.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    // Position-based access for the analytics and graph builders.

    pub(crate) fn paper_position(&self, id: &str) -> Option<usize> {
        self.paper_index.get(id).copied()
    }

    pub(crate) fn author_positions_of_paper(&self, paper: usize) -> &[usize] {
        &self.authors_by_paper[paper]
    }

    pub(crate) fn stats_at(&self, author: usize) -> AuthorStats {
        self.author_stats[author]
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Read one table file. Rows that do not deserialize are logged, skipped
/// and added to `malformed`.
fn read_table<T: DeserializeOwned>(table: &str, path: &Path, malformed: &mut usize) -> Result<Vec<T>> {
    let bytes = std::fs::read(path).map_err(|e| AppError::DataUnavailable {
        table: table.to_string(),
        message: format!("{}: {}", path.display(), e),
    })?;

    let rows: Vec<serde_json::Value> =
        serde_json::from_slice(&bytes).map_err(|e| AppError::DataUnavailable {
            table: table.to_string(),
            message: format!("{}: {}", path.display(), e),
        })?;

    let mut parsed = Vec::with_capacity(rows.len());
    for (row, value) in rows.into_iter().enumerate() {
        match serde_json::from_value(value) {
            Ok(record) => parsed.push(record),
            Err(e) => {
                warn!(table, row, error = %e, "Skipping malformed row");
                *malformed += 1;
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn config_for(dir: &Path) -> DatasetConfig {
        DatasetConfig {
            data_dir: dir.to_path_buf(),
            ..DatasetConfig::default()
        }
    }

    fn write_all(dir: &Path) {
        write(
            dir,
            "papers.json",
            r#"[{"paperid": 1, "year": 2020, "cited_by_count": 5, "patent_count": 1, "title": "A"},
                {"paperid": 2, "year": 2021, "cited_by_count": 0, "patent_count": 0},
                {"paperid": 3, "year": null, "cited_by_count": 10, "patent_count": 2}]"#,
        );
        write(
            dir,
            "paper_refs.json",
            r#"[{"citing_paperid": 2, "cited_paperid": 1},
                {"citing_paperid": 3, "cited_paperid": 99}]"#,
        );
        write(
            dir,
            "authors.json",
            r#"[{"authorid": "a1", "display_name": "Ada", "h_index": 12.0},
                {"authorid": "a2", "display_name": null}]"#,
        );
        write(
            dir,
            "paper_author_affiliation.json",
            r#"[{"paperid": 1, "authorid": "a1"},
                {"paperid": 1, "authorid": "a2"},
                {"paperid": 1, "authorid": "a2"},
                {"paperid": 3, "authorid": "a2"},
                {"paperid": 4, "authorid": "a1"}]"#,
        );
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());

        let ds = tokio_test::assert_ok!(Dataset::load(&config_for(dir.path())));
        let report = ds.load_report();

        assert_eq!(report.papers, 3);
        assert_eq!(report.references, 1);
        assert_eq!(report.dangling_references, 1);
        assert_eq!(report.affiliations, 3);
        assert_eq!(report.duplicate_affiliations, 1);
        assert_eq!(report.dangling_affiliations, 1);

        assert_eq!(ds.paper("3").unwrap().year, None);
        assert_eq!(ds.author("a2").unwrap().display_name, "");
    }

    #[test]
    fn test_author_stats_consistent_with_affiliations() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());
        let ds = Dataset::load(&config_for(dir.path())).unwrap();

        let a1 = ds.author_stats("a1").unwrap();
        assert_eq!(a1.paper_count, 1);
        assert_eq!(a1.h_index, 12.0);

        // a2 has no stored h-index: papers with 5 and 10 citations -> h = 2
        let a2 = ds.author_stats("a2").unwrap();
        assert_eq!(a2.paper_count, 2);
        assert_eq!(a2.h_index, 2.0);

        let papers: Vec<&str> = ds.papers_of("a2").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(papers, vec!["1", "3"]);
        assert_eq!(ds.authors_of("1").len(), 2);
        assert!(ds.authors_of("404").is_empty());
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());
        std::fs::remove_file(dir.path().join("authors.json")).unwrap();

        let err = Dataset::load(&config_for(dir.path())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataUnavailable);
        assert!(err.to_string().contains("authors"));
    }

    #[test]
    fn test_corrupt_table_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());
        write(dir.path(), "paper_refs.json", "{not json");

        let err = Dataset::load(&config_for(dir.path())).unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable { ref table, .. } if table == "paper_refs"));
    }

    #[test]
    fn test_malformed_rows_are_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path());
        write(
            dir.path(),
            "papers.json",
            r#"[{"paperid": 1, "year": 2020, "cited_by_count": 9007199254740993},
                {"paperid": 2, "year": 5000000000},
                {"paperid": 3, "cited_by_count": -1}]"#,
        );

        let ds = tokio_test::assert_ok!(Dataset::load(&config_for(dir.path())));
        let report = ds.load_report();
        assert_eq!(report.papers, 1);
        assert_eq!(report.malformed_rows, 2);
        assert_eq!(ds.paper("1").unwrap().cited_by_count, 9_007_199_254_740_993);
        assert!(ds.paper("2").is_none());
    }

    #[test]
    fn test_duplicate_paper_ids_keep_first() {
        let ds = Dataset::from_tables(
            vec![Paper::new("p", Some(2020), 1, 0), Paper::new("p", Some(2021), 9, 0)],
            vec![],
            vec![],
            vec![],
        );
        assert_eq!(ds.papers().len(), 1);
        assert_eq!(ds.paper("p").unwrap().cited_by_count, 1);
        assert_eq!(ds.load_report().duplicate_papers, 1);
    }

    #[test]
    fn test_self_citations_are_kept() {
        let ds = Dataset::from_tables(
            vec![Paper::new("p", Some(2020), 1, 0)],
            vec![Citation::new("p", "p"), Citation::new("p", "p")],
            vec![],
            vec![],
        );
        assert_eq!(ds.references().len(), 2);
    }
}
