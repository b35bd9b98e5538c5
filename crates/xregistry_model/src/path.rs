// SPDX-License-Identifier: Apache-2.0

//! Typed attribute paths, used to locate diagnostics.
//!
//! A path is a sequence of name segments with optional array indexes, e.g.
//! `model.groups.dirs.resources.files.attributes.foo`. User-supplied dotted
//! paths are parsed with position-annotated errors.

use std::fmt::{Display, Formatter};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPart {
    Name(String),
    Index(usize),
}

/// A property path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropPath {
    parts: Vec<PathPart>,
}

impl PropPath {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        PropPath::default()
    }

    /// Returns a new path with a name segment appended.
    #[must_use]
    pub fn p(&self, name: &str) -> Self {
        let mut path = self.clone();
        path.parts.push(PathPart::Name(name.to_owned()));
        path
    }

    /// Returns a new path with an array index appended.
    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        let mut path = self.clone();
        path.parts.push(PathPart::Index(i));
        path
    }

    /// Renders the path for the user: names joined with `.`, indexes as
    /// `[i]`.
    #[must_use]
    pub fn ui(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                PathPart::Name(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathPart::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Parses a user-supplied dotted path.
    ///
    /// `/` is rejected outright, as are leading, trailing and doubled dots;
    /// the error carries the 1-based position of the offending character.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut parts = Vec::new();
        let mut segment = String::new();
        let mut pos = 0;
        for ch in s.chars() {
            pos += 1;
            match ch {
                '/' => {
                    return Err(Error::PathParse {
                        ch: '/',
                        path: s.to_owned(),
                        pos,
                    })
                }
                '.' => {
                    if segment.is_empty() {
                        return Err(Error::PathParse {
                            ch: '.',
                            path: s.to_owned(),
                            pos,
                        });
                    }
                    parts.push(PathPart::Name(std::mem::take(&mut segment)));
                }
                _ => segment.push(ch),
            }
        }
        if !segment.is_empty() {
            parts.push(PathPart::Name(segment));
        } else if !s.is_empty() {
            // the string ended on the dot we just consumed
            return Err(Error::PathParse {
                ch: '.',
                path: s.to_owned(),
                pos,
            });
        }
        Ok(PropPath { parts })
    }
}

impl Display for PropPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ui())
    }
}
