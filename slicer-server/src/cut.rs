//! Textual cut grammar.
//!
//! A cut string holds one or more dimension cuts separated by `|`:
//!
//! ```text
//! date:2024,1|!category:books;music|price:10-
//! ```
//!
//! Each cut is `[!]dimension[@hierarchy]:body`. The body is a set of paths
//! (`;`), a range (`from-to`, open on either side) or a single point path.
//! Path elements are separated by `,`. A backslash escapes the next character.

use crate::workspace::Cube;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

const CUT_SEPARATOR: char = '|';
const DIMENSION_SEPARATOR: char = ':';
const PATH_SEPARATOR: char = ',';
const RANGE_SEPARATOR: char = '-';
const SET_SEPARATOR: char = ';';
const HIERARCHY_SEPARATOR: char = '@';
const INVERT_PREFIX: char = '!';
const ESCAPE: char = '\\';

const RESERVED: &[char] = &[
    ESCAPE,
    CUT_SEPARATOR,
    DIMENSION_SEPARATOR,
    PATH_SEPARATOR,
    RANGE_SEPARATOR,
    SET_SEPARATOR,
];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CutError {
    #[error("Dimension cut '{0}' does not match pattern 'DIMENSION:PATH'")]
    InvalidCut(String),

    #[error("Invalid dimension or hierarchy name in cut '{0}'")]
    InvalidName(String),

    #[error("Range cut '{0}' has more than one range separator")]
    InvalidRange(String),
}

/// Ordered list of level keys, from the top of a hierarchy downwards.
pub type Path = Vec<String>;

/// One dimension-level filter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cut {
    pub dimension: String,
    pub hierarchy: Option<String>,
    pub invert: bool,
    pub hidden: bool,
    #[serde(flatten)]
    pub kind: CutKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CutKind {
    Point {
        path: Path,
    },
    Range {
        from: Option<Path>,
        to: Option<Path>,
    },
    Set {
        paths: Vec<Path>,
    },
}

impl Cut {
    pub fn point<D: Into<String>>(dimension: D, path: Path) -> Self {
        Self::with_kind(dimension, CutKind::Point { path })
    }

    pub fn range<D: Into<String>>(dimension: D, from: Option<Path>, to: Option<Path>) -> Self {
        Self::with_kind(dimension, CutKind::Range { from, to })
    }

    pub fn set<D: Into<String>>(dimension: D, paths: Vec<Path>) -> Self {
        Self::with_kind(dimension, CutKind::Set { paths })
    }

    fn with_kind<D: Into<String>>(dimension: D, kind: CutKind) -> Self {
        Cut {
            dimension: dimension.into(),
            hierarchy: None,
            invert: false,
            hidden: false,
            kind,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn in_hierarchy<H: Into<String>>(mut self, hierarchy: H) -> Self {
        self.hierarchy = Some(hierarchy.into());
        self
    }
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            write!(f, "{INVERT_PREFIX}")?;
        }
        write!(f, "{}", self.dimension)?;
        if let Some(hierarchy) = &self.hierarchy {
            write!(f, "{HIERARCHY_SEPARATOR}{hierarchy}")?;
        }
        write!(f, "{DIMENSION_SEPARATOR}")?;

        match &self.kind {
            CutKind::Point { path } => write!(f, "{}", path_to_string(path)),
            CutKind::Range { from, to } => write!(
                f,
                "{}{RANGE_SEPARATOR}{}",
                from.as_deref().map(path_to_string).unwrap_or_default(),
                to.as_deref().map(path_to_string).unwrap_or_default(),
            ),
            CutKind::Set { paths } => {
                let paths: Vec<String> = paths.iter().map(|p| path_to_string(p)).collect();
                write!(f, "{}", paths.join(&SET_SEPARATOR.to_string()))
            }
        }
    }
}

/// Parses every cut encoded in `text`. An empty string yields no cuts.
pub fn cuts_from_string(text: &str) -> Result<Vec<Cut>, CutError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    split_unescaped(text, CUT_SEPARATOR)
        .into_iter()
        .map(cut_from_string)
        .collect()
}

/// Parses a single `[!]dimension[@hierarchy]:body` cut.
pub fn cut_from_string(text: &str) -> Result<Cut, CutError> {
    let (invert, rest) = match text.strip_prefix(INVERT_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (target, body) = rest
        .split_once(DIMENSION_SEPARATOR)
        .ok_or_else(|| CutError::InvalidCut(text.to_string()))?;

    let (dimension, hierarchy) = match target.split_once(HIERARCHY_SEPARATOR) {
        Some((dimension, hierarchy)) => (dimension, Some(hierarchy)),
        None => (target, None),
    };

    if !is_identifier(dimension) || hierarchy.is_some_and(|h| !is_identifier(h)) {
        return Err(CutError::InvalidName(text.to_string()));
    }

    let set_parts = split_unescaped(body, SET_SEPARATOR);
    let kind = if set_parts.len() > 1 {
        CutKind::Set {
            paths: set_parts.into_iter().map(path_from_string).collect(),
        }
    } else {
        match split_unescaped(body, RANGE_SEPARATOR).as_slice() {
            [point] => CutKind::Point {
                path: path_from_string(point),
            },
            [from, to] => CutKind::Range {
                from: (!from.is_empty()).then(|| path_from_string(from)),
                to: (!to.is_empty()).then(|| path_from_string(to)),
            },
            _ => return Err(CutError::InvalidRange(text.to_string())),
        }
    };

    Ok(Cut {
        dimension: dimension.to_string(),
        hierarchy: hierarchy.map(str::to_string),
        invert,
        hidden: false,
        kind,
    })
}

fn path_from_string(text: &str) -> Path {
    if text.is_empty() {
        return Vec::new();
    }
    split_unescaped(text, PATH_SEPARATOR)
        .into_iter()
        .map(unescape)
        .collect()
}

fn path_to_string(path: &[String]) -> String {
    let elements: Vec<String> = path.iter().map(|e| escape(e)).collect();
    elements.join(&PATH_SEPARATOR.to_string())
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Splits on `separator`, skipping occurrences preceded by the escape character.
/// Escapes are left in place for the caller to remove.
fn split_unescaped(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == ESCAPE {
            escaped = true;
        } else if ch == separator {
            parts.push(&text[start..index]);
            start = index + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            // A trailing backslash is kept literally
            out.push(chars.next().unwrap_or(ESCAPE));
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if RESERVED.contains(&ch) {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// A conjunction of cuts bound to a cube. Never modified after construction.
#[derive(Clone, Debug)]
pub struct Cell {
    cube: Option<Arc<dyn Cube>>,
    cuts: Vec<Cut>,
}

impl Cell {
    pub fn new(cube: Option<Arc<dyn Cube>>, cuts: Vec<Cut>) -> Self {
        Cell { cube, cuts }
    }

    pub fn cube(&self) -> Option<&Arc<dyn Cube>> {
        self.cube.as_ref()
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }
}
