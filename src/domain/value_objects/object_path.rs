//! Object path value object
//!
//! A parsed property path such as `participation[RecordTarget].player.dateOfBirth`.
//! Each segment names a property; an optional `[guard]` narrows a collection
//! either to one index (`[0]`) or to the elements whose classifier equals the
//! guard text.

use std::fmt;
use std::str::FromStr;

use crate::error::CompileError;

/// One `name[guard]` step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub name: String,
    pub guard: Option<String>,
}

impl PathSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: None,
        }
    }

    /// Numeric guards address a collection element by position
    pub fn index(&self) -> Option<usize> {
        self.guard.as_deref().and_then(|g| g.parse().ok())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.guard {
            Some(guard) => write!(f, "{}[{}]", self.name, guard),
            None => f.write_str(&self.name),
        }
    }
}

/// A parsed, validated property path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ObjectPath {
    segments: Vec<PathSegment>,
}

impl ObjectPath {
    /// The empty path addresses the target itself
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, CompileError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        let mut name = String::new();
        let mut guard: Option<String> = None;
        let mut in_guard = false;
        let mut closed = false;

        for (pos, ch) in trimmed.char_indices() {
            if in_guard {
                match ch {
                    ']' => {
                        in_guard = false;
                        closed = true;
                    }
                    '[' => return Err(CompileError::new(text, pos, "nested '[' in path guard")),
                    _ => guard.get_or_insert_with(String::new).push(ch),
                }
                continue;
            }
            match ch {
                '.' => {
                    segments.push(Self::finish_segment(text, pos, &mut name, &mut guard)?);
                    closed = false;
                }
                '[' => {
                    if closed || name.is_empty() {
                        return Err(CompileError::new(text, pos, "guard must follow a property name"));
                    }
                    in_guard = true;
                    guard = Some(String::new());
                }
                _ if closed => {
                    return Err(CompileError::new(text, pos, "expected '.' after guard"));
                }
                c if c.is_alphanumeric() || c == '_' || c == '$' || c == '-' || c == '@' => {
                    name.push(c)
                }
                other => {
                    return Err(CompileError::new(
                        text,
                        pos,
                        format!("unexpected character '{}' in path", other),
                    ))
                }
            }
        }

        if in_guard {
            return Err(CompileError::new(text, trimmed.len(), "unclosed '[' in path"));
        }
        segments.push(Self::finish_segment(text, trimmed.len(), &mut name, &mut guard)?);
        Ok(Self { segments })
    }

    fn finish_segment(
        text: &str,
        pos: usize,
        name: &mut String,
        guard: &mut Option<String>,
    ) -> Result<PathSegment, CompileError> {
        if name.is_empty() {
            return Err(CompileError::new(text, pos, "empty path segment"));
        }
        let guard = guard.take().map(|g| g.trim().to_string());
        if guard.as_deref() == Some("") {
            return Err(CompileError::new(text, pos, "empty path guard"));
        }
        Ok(PathSegment {
            name: std::mem::take(name),
            guard,
        })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Split into the parent path and the final segment
    pub fn split_last(&self) -> Option<(ObjectPath, &PathSegment)> {
        self.segments.split_last().map(|(last, parent)| {
            (
                ObjectPath {
                    segments: parent.to_vec(),
                },
                last,
            )
        })
    }

    /// Builder: append one segment
    pub fn child(mut self, segment: PathSegment) -> Self {
        self.segments.push(segment);
        self
    }
}

impl FromStr for ObjectPath {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&text)
    }
}
