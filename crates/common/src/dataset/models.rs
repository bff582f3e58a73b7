//! Table records of the citation snapshot
//!
//! Field names follow the exported table columns (`paperid`, `authorid`,
//! `citing_paperid`, ...). Identifiers may be exported either as strings or
//! as integers; both are normalised to `String`.

use serde::{Deserialize, Deserializer, Serialize};

/// A paper in the filtered dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(rename = "paperid", deserialize_with = "de_id")]
    pub id: String,

    /// Publication year; `None` means unknown
    #[serde(default, deserialize_with = "de_year")]
    pub year: Option<i32>,

    #[serde(default, deserialize_with = "de_count")]
    pub cited_by_count: u64,

    /// Number of patents citing this paper
    #[serde(default, deserialize_with = "de_count")]
    pub patent_count: u64,

    #[serde(default)]
    pub title: Option<String>,
}

/// Directed citation row: `citing` references `cited`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(rename = "citing_paperid", deserialize_with = "de_id")]
    pub citing: String,

    #[serde(rename = "cited_paperid", deserialize_with = "de_id")]
    pub cited: String,
}

/// Author row as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(rename = "authorid", deserialize_with = "de_id")]
    pub id: String,

    #[serde(default, deserialize_with = "de_name")]
    pub display_name: String,

    /// Stored h-index; derived from the snapshot when absent
    #[serde(default)]
    pub h_index: Option<f64>,

    #[serde(default)]
    pub productivity: Option<f64>,
}

/// Paper-author join row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(rename = "paperid", deserialize_with = "de_id")]
    pub paper_id: String,

    #[serde(rename = "authorid", deserialize_with = "de_id")]
    pub author_id: String,
}

/// Author aggregates derived once when the snapshot is built
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AuthorStats {
    /// Distinct papers joined to the author
    pub paper_count: usize,
    pub h_index: f64,
    pub productivity: f64,
}

impl Paper {
    pub fn new(id: impl Into<String>, year: Option<i32>, cited_by_count: u64, patent_count: u64) -> Self {
        Self {
            id: id.into(),
            year,
            cited_by_count,
            patent_count,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Citation {
    pub fn new(citing: impl Into<String>, cited: impl Into<String>) -> Self {
        Self {
            citing: citing.into(),
            cited: cited.into(),
        }
    }
}

impl Author {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            h_index: None,
            productivity: None,
        }
    }

    pub fn with_h_index(mut self, h_index: f64) -> Self {
        self.h_index = Some(h_index);
        self
    }
}

impl Affiliation {
    pub fn new(paper_id: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            author_id: author_id.into(),
        }
    }
}

/// h-index of a set of citation counts: the largest h such that h of the
/// counts are at least h.
pub fn h_index_of(mut citations: Vec<u64>) -> f64 {
    citations.sort_unstable_by(|a, b| b.cmp(a));
    citations
        .iter()
        .enumerate()
        .take_while(|&(i, &c)| c > i as u64)
        .count() as f64
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Unsigned(n) => n.to_string(),
        RawId::Signed(n) => n.to_string(),
    })
}

/// Integer column as exported: exact integers, numeric strings, or integral
/// floats written by dataframe exports for columns with missing values.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

// 2^53; larger floats no longer hold every integer exactly
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

impl RawInt {
    fn to_i128(&self) -> Option<i128> {
        match self {
            RawInt::Unsigned(n) => Some(i128::from(*n)),
            RawInt::Signed(n) => Some(i128::from(*n)),
            RawInt::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_EXACT_FLOAT => {
                Some(*v as i128)
            }
            RawInt::Float(_) => None,
            RawInt::Text(s) => s.trim().parse::<i128>().ok(),
        }
    }

    fn describe(&self) -> String {
        match self {
            RawInt::Unsigned(n) => n.to_string(),
            RawInt::Signed(n) => n.to_string(),
            RawInt::Float(v) => v.to_string(),
            RawInt::Text(s) => format!("{:?}", s),
        }
    }
}

fn de_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let Some(raw) = Option::<RawInt>::deserialize(deserializer)? else {
        return Ok(None);
    };
    raw.to_i128()
        .and_then(|v| i32::try_from(v).ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid year {}", raw.describe())))
}

fn de_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let Some(raw) = Option::<RawInt>::deserialize(deserializer)? else {
        return Ok(0);
    };
    raw.to_i128()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid count {}", raw.describe())))
}

fn de_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_accepts_numeric_ids_and_float_years() {
        let paper: Paper = serde_json::from_str(
            r#"{"paperid": 2041, "year": 2019.0, "cited_by_count": 12, "patent_count": null, "title": "Graphs"}"#,
        )
        .unwrap();
        assert_eq!(paper.id, "2041");
        assert_eq!(paper.year, Some(2019));
        assert_eq!(paper.cited_by_count, 12);
        assert_eq!(paper.patent_count, 0);
    }

    #[test]
    fn test_paper_missing_year_is_unknown() {
        let paper: Paper = serde_json::from_str(r#"{"paperid": "p1", "year": null}"#).unwrap();
        assert_eq!(paper.year, None);
        assert_eq!(paper.cited_by_count, 0);
        assert_eq!(paper.title, None);
    }

    #[test]
    fn test_negative_count_rejected() {
        let result: Result<Paper, _> =
            serde_json::from_str(r#"{"paperid": "p1", "cited_by_count": -3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_large_counts_load_exactly() {
        let paper: Paper = serde_json::from_str(
            r#"{"paperid": "p", "cited_by_count": 9007199254740993, "patent_count": "42"}"#,
        )
        .unwrap();
        assert_eq!(paper.cited_by_count, 9_007_199_254_740_993);
        assert_eq!(paper.patent_count, 42);
    }

    #[test]
    fn test_out_of_range_year_rejected() {
        let result: Result<Paper, _> = serde_json::from_str(r#"{"paperid": "p", "year": 5000000000}"#);
        assert!(result.is_err());

        let result: Result<Paper, _> = serde_json::from_str(r#"{"paperid": "p", "year": 2019.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_imprecise_float_count_rejected() {
        let result: Result<Paper, _> =
            serde_json::from_str(r#"{"paperid": "p", "cited_by_count": 1e17}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_h_index_of() {
        assert_eq!(h_index_of(vec![]), 0.0);
        assert_eq!(h_index_of(vec![0, 0]), 0.0);
        assert_eq!(h_index_of(vec![10, 8, 5, 4, 3]), 4.0);
        assert_eq!(h_index_of(vec![25, 8, 5, 3, 3]), 3.0);
        assert_eq!(h_index_of(vec![1, 1, 1]), 1.0);
    }
}
