//! Feed parsers: raw bytes to courses and sections

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use tracing::debug;

use super::types::{item_prefix, Group, ParsedFeed, ResourceRecord};
use crate::error::{Error, Result};

/// Turns the raw feed into courses and sections
pub trait FeedParser: Send + Sync {
    /// Parse a complete feed
    fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed>;
}

// Registrar export layout (first sheet)
const COL_LABEL: usize = 0;
const COL_COURSE: usize = 2;
const COL_SECTION: usize = 3;
const COL_TITLE: usize = 4;
const COL_ENROLLED: usize = 11;
const COL_CAPACITY: usize = 12;

/// Parses the registrar's "school schedule by term" workbook
///
/// The first cell of the first row holds the term label. Every other row
/// with a course code, a section and numeric enrollment/capacity columns is a
/// section; header and footer rows fall out because their numbers don't
/// parse. A repeated `(course, section)` pair keeps its first occurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsFeedParser;

impl FeedParser for XlsFeedParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| Error::Parse(format!("cannot open workbook: {}", e)))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Parse("workbook has no sheets".to_string()))?
            .map_err(|e| Error::Parse(format!("cannot read first sheet: {}", e)))?;

        parse_rows(range.rows())
    }
}

pub(crate) fn parse_rows<'a, I>(rows: I) -> Result<ParsedFeed>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter().peekable();
    let label = rows
        .peek()
        .and_then(|row| cell_text(row, COL_LABEL))
        .ok_or_else(|| Error::Parse("missing term label in first row".to_string()))?;

    let mut seen = HashSet::new();
    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut prefixes = BTreeSet::new();
    let mut skipped = 0usize;

    for row in rows {
        let Some(course) = cell_text(row, COL_COURSE) else {
            continue;
        };
        let Some(section) = cell_text(row, COL_SECTION) else {
            continue;
        };
        if !seen.insert((course.clone(), section.clone())) {
            continue;
        }

        let (Some(size), Some(capacity)) =
            (cell_number(row, COL_ENROLLED), cell_number(row, COL_CAPACITY))
        else {
            skipped += 1;
            continue;
        };

        let prefix = item_prefix(&section);
        if !prefix.is_empty() {
            prefixes.insert(prefix.to_string());
        }

        let group = groups.entry(course.clone()).or_insert_with(|| Group {
            key: course.clone(),
            title: cell_text(row, COL_TITLE).unwrap_or_default(),
            records: Vec::new(),
        });
        group
            .records
            .push(ResourceRecord::new(course, section, size, capacity));
    }

    debug!(
        label = %label,
        groups = groups.len(),
        skipped_rows = skipped,
        "Parsed schedule workbook"
    );

    Ok(ParsedFeed {
        label,
        groups,
        item_prefixes: prefixes.into_iter().collect(),
    })
}

fn cell_text(row: &[Data], idx: usize) -> Option<String> {
    let text = match row.get(idx)? {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn cell_number(row: &[Data], idx: usize) -> Option<i64> {
    match row.get(idx)? {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a JSON rendition of the feed
///
/// ```json
/// {
///   "label": "Fall 2025",
///   "courses": [
///     { "code": "PHYS 161", "title": "Physics I",
///       "sections": [ { "section": "1L", "enrolled": 118, "capacity": 120 } ] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFeedParser;

#[derive(Deserialize)]
struct JsonFeed {
    label: String,
    #[serde(default)]
    courses: Vec<JsonCourse>,
}

#[derive(Deserialize)]
struct JsonCourse {
    code: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<JsonSection>,
}

#[derive(Deserialize)]
struct JsonSection {
    section: String,
    enrolled: i64,
    capacity: i64,
}

impl FeedParser for JsonFeedParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed> {
        let feed: JsonFeed = serde_json::from_slice(bytes)
            .map_err(|e| Error::Parse(format!("invalid JSON feed: {}", e)))?;

        let mut groups: HashMap<String, Group> = HashMap::new();
        let mut prefixes = BTreeSet::new();

        for course in feed.courses {
            let group = groups.entry(course.code.clone()).or_insert_with(|| Group {
                key: course.code.clone(),
                title: course.title.clone(),
                records: Vec::new(),
            });
            for section in course.sections {
                if group.record(&section.section).is_some() {
                    continue;
                }
                let prefix = item_prefix(&section.section);
                if !prefix.is_empty() {
                    prefixes.insert(prefix.to_string());
                }
                group.records.push(ResourceRecord::new(
                    course.code.clone(),
                    section.section,
                    section.enrolled,
                    section.capacity,
                ));
            }
        }

        Ok(ParsedFeed {
            label: feed.label,
            groups,
            item_prefixes: prefixes.into_iter().collect(),
        })
    }
}
