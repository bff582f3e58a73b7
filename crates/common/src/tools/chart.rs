//! Declarative Vega-Lite chart descriptions attached to tool results

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

const DEFAULT_WIDTH: u32 = 600;
const DEFAULT_HEIGHT: u32 = 400;
const BAR_COLOR: &str = "#4a90d9";

/// Vega-Lite v5 single-view specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub data: ChartData,
    pub mark: Mark,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkType {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkType,
    pub tooltip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Quantitative,
    Ordinal,
    Nominal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Vega-Lite sort shorthand, e.g. `-x`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub x: Channel,
    pub y: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Channel>,
    /// Extra fields shown on hover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Vec<Channel>>,
}

impl Channel {
    pub fn new(field: &str, kind: FieldType) -> Self {
        Self {
            field: field.to_string(),
            kind,
            title: Some(humanize(field)),
            sort: None,
        }
    }

    pub fn sorted(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

impl ChartSpec {
    fn with_mark(title: &str, values: Vec<Value>, mark: Mark, x: Channel, y: Channel) -> Self {
        Self {
            schema: VEGA_LITE_SCHEMA.to_string(),
            title: title.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            data: ChartData { values },
            mark,
            encoding: Encoding { x, y, color: None, tooltip: None },
        }
    }

    /// Vertical bars over an ordinal x field
    pub fn bar(title: &str, values: Vec<Value>, x_field: &str, y_field: &str) -> Self {
        Self::with_mark(
            title,
            values,
            Mark {
                kind: MarkType::Bar,
                tooltip: true,
                color: None,
                point: None,
            },
            Channel::new(x_field, FieldType::Ordinal),
            Channel::new(y_field, FieldType::Quantitative),
        )
    }

    /// Horizontal bars, categories sorted by value descending
    pub fn horizontal_bar(title: &str, values: Vec<Value>, category_field: &str, value_field: &str) -> Self {
        Self::with_mark(
            title,
            values,
            Mark {
                kind: MarkType::Bar,
                tooltip: true,
                color: Some(BAR_COLOR.to_string()),
                point: None,
            },
            Channel::new(value_field, FieldType::Quantitative),
            Channel::new(category_field, FieldType::Nominal).sorted("-x"),
        )
    }

    /// Line with point markers over an ordinal x field
    pub fn line(title: &str, values: Vec<Value>, x_field: &str, y_field: &str) -> Self {
        Self::with_mark(
            title,
            values,
            Mark {
                kind: MarkType::Line,
                tooltip: true,
                color: None,
                point: Some(true),
            },
            Channel::new(x_field, FieldType::Ordinal),
            Channel::new(y_field, FieldType::Quantitative),
        )
    }

    pub fn with_color(mut self, field: &str) -> Self {
        self.encoding.color = Some(Channel::new(field, FieldType::Nominal));
        self
    }

    pub fn with_tooltip(mut self, channels: Vec<Channel>) -> Self {
        self.encoding.tooltip = Some(channels);
        self
    }

    /// Relabel the category axis of a horizontal bar chart
    pub fn with_category_title(mut self, title: &str) -> Self {
        self.encoding.y = self.encoding.y.titled(title);
        self
    }
}

/// `total_citations` -> `Total Citations`
fn humanize(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
