//! Parser for the `include` query parameter
//!
//! ```text
//! include := path (SEPARATOR path)*
//! path    := segment (NESTED segment)*
//! segment := [A-Za-z0-9_]*
//! ```
//!
//! Entries are trimmed and empty entries dropped before a path is parsed.
//! Each path is parsed by recursive descent into typed [`RelationPath`]s so
//! that depth and character limits are checked independently of how the
//! relation tree is later assembled.

use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const FORBIDDEN_CHARS: [char; 4] = [';', '\'', '"', '\\'];

/// Limits and separators applied when parsing an include parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeOptions {
    /// Maximum number of segments in one path
    pub max_depth: usize,

    /// Maximum number of paths in one parameter
    pub max_relations: usize,

    /// Separator between paths
    pub separator: char,

    /// Separator between segments of one path
    pub nested_separator: char,
}

impl Default for IncludeOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_relations: 10,
            separator: ',',
            nested_separator: '.',
        }
    }
}

/// A validated relation path such as `categories.products`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationPath {
    raw: String,
    segments: Vec<String>,
    depth: usize,
    nested_separator: char,
}

impl RelationPath {
    /// Parse a single path with the given nested separator
    pub fn parse(raw: &str, nested_separator: char) -> Result<Self, ValidationError> {
        let mut cursor = Cursor::new(raw, nested_separator);
        let segments = cursor.path().ok_or_else(|| ValidationError::InvalidRelationFormat {
            relation: raw.to_string(),
        })?;
        let depth = segments.len();

        Ok(Self {
            raw: raw.to_string(),
            segments: segments
                .into_iter()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            depth,
            nested_separator,
        })
    }

    fn from_segments(segments: Vec<String>, nested_separator: char) -> Self {
        let raw = segments.join(&nested_separator.to_string());
        Self {
            raw,
            depth: segments.len(),
            segments,
            nested_separator,
        }
    }

    /// The path as written (trimmed)
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Non-empty segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments as written, including empty ones (`a..b` is 3)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// The path without its first segment, `None` for single-segment paths
    pub fn tail(&self) -> Option<RelationPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self::from_segments(
            self.segments[1..].to_vec(),
            self.nested_separator,
        ))
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Recursive-descent cursor over one path
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    nested_separator: char,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, nested_separator: char) -> Self {
        Self {
            input,
            pos: 0,
            nested_separator,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// path := segment (NESTED segment)*, consuming the whole input
    fn path(&mut self) -> Option<Vec<&'a str>> {
        let mut segments = vec![self.segment()];
        while self.peek() == Some(self.nested_separator) {
            self.pos += self.nested_separator.len_utf8();
            segments.push(self.segment());
        }
        if self.pos == self.input.len() {
            Some(segments)
        } else {
            None
        }
    }

    /// segment := [A-Za-z0-9_]*
    fn segment(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }
}

/// Parse a raw include parameter.
///
/// Returns `Ok(None)` when nothing is requested (absent, empty or only
/// separators). Checks run in a fixed order: forbidden characters, relation
/// count, path format, then depth.
pub fn parse_include(
    raw: Option<&str>,
    options: &IncludeOptions,
) -> Result<Option<Vec<RelationPath>>, ValidationError> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if raw.contains(FORBIDDEN_CHARS) {
        return Err(ValidationError::InvalidIncludeCharacters);
    }

    let entries: Vec<&str> = raw
        .split(options.separator)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    if entries.is_empty() {
        return Ok(None);
    }

    if entries.len() > options.max_relations {
        return Err(ValidationError::TooManyRelations {
            max: options.max_relations,
            found: entries.len(),
        });
    }

    let paths = entries
        .into_iter()
        .map(|entry| RelationPath::parse(entry, options.nested_separator))
        .collect::<Result<Vec<_>, _>>()?;

    let deepest = paths.iter().map(RelationPath::depth).max().unwrap_or(0);
    if deepest > options.max_depth {
        return Err(ValidationError::MaxDepthExceeded {
            max: options.max_depth,
            found: deepest,
        });
    }

    Ok(Some(paths))
}

/// Parse an include parameter of arbitrary JSON shape; anything other than
/// a string means no relations
pub fn parse_include_value(
    raw: &Value,
    options: &IncludeOptions,
) -> Result<Option<Vec<RelationPath>>, ValidationError> {
    parse_include(raw.as_str(), options)
}
