//! Structured configuration property names.
//!
//! A [`PropertyName`] is an ordered list of elements such as
//! `server.hosts[0].port`. Names compare in their *relaxed* form: case is
//! ignored, as are `-` and `_` separators, so `listValue`, `list-value` and
//! `list_value` all refer to the same property. Names are always rendered in
//! their canonical (lower-cased) form.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::ConfigError;

/// A single element of a [`PropertyName`].
#[derive(Debug, Clone)]
pub struct Element {
    text: String,
    relaxed: String,
    indexed: bool,
}

impl Element {
    /// A dot-separated element. The text is lower-cased.
    pub fn dashed(text: &str) -> Self {
        let text = text.to_lowercase();
        let relaxed = text.chars().filter(|c| *c != '-' && *c != '_').collect();
        Self {
            text,
            relaxed,
            indexed: false,
        }
    }

    /// A bracketed element (`[0]`, `[some.key]`). The text is kept verbatim.
    pub fn indexed(text: &str) -> Self {
        Self {
            text: text.to_string(),
            relaxed: text.to_string(),
            indexed: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Returns the numeric index of this element, if it is one.
    ///
    /// Both `[2]` and a dashed `2` (as produced by environment variables)
    /// count as indexes.
    pub fn index(&self) -> Option<usize> {
        if self.text.is_empty() || !self.text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.text.parse().ok()
    }

    fn needs_brackets(&self) -> bool {
        self.indexed || self.text.contains(|c| matches!(c, '.' | '[' | ']'))
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.relaxed == other.relaxed
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relaxed.hash(state);
    }
}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        self.relaxed.cmp(&other.relaxed)
    }
}

/// A dotted/indexed configuration property name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyName {
    elements: Vec<Element>,
}

impl PropertyName {
    /// The empty name, which is the ancestor of every other name.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a name such as `test.foo.listValue[2]`.
    pub fn of(name: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPropertyName(name.to_string());
        let mut elements = Vec::new();
        let mut rest = name;

        while !rest.is_empty() {
            if let Some(bracketed) = rest.strip_prefix('[') {
                let end = bracketed.find(']').ok_or_else(invalid)?;
                if end == 0 {
                    return Err(invalid());
                }
                elements.push(Element::indexed(&bracketed[..end]));
                rest = &bracketed[end + 1..];
            } else {
                let end = rest.find(|c| c == '.' || c == '[').unwrap_or(rest.len());
                if end == 0 {
                    return Err(invalid());
                }
                elements.push(Element::dashed(&rest[..end]));
                rest = &rest[end..];
            }

            if let Some(after_dot) = rest.strip_prefix('.') {
                if after_dot.is_empty() || after_dot.starts_with('[') {
                    return Err(invalid());
                }
                rest = after_dot;
            } else if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid());
            }
        }

        Ok(Self { elements })
    }

    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn last_element(&self) -> Option<&Element> {
        self.elements.last()
    }

    /// Returns a child name. Keys containing `.` or brackets become a single
    /// bracketed element.
    pub fn append(&self, key: &str) -> Self {
        let element = if key.contains(|c| matches!(c, '.' | '[' | ']')) {
            Element::indexed(key)
        } else {
            Element::dashed(key)
        };
        self.with(element)
    }

    pub fn append_index(&self, index: usize) -> Self {
        self.with(Element::indexed(&index.to_string()))
    }

    /// Appends every element of `other` to this name.
    pub fn join(&self, other: &PropertyName) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(other.elements.iter().cloned());
        Self { elements }
    }

    fn with(&self, element: Element) -> Self {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.extend(self.elements.iter().cloned());
        elements.push(element);
        Self { elements }
    }

    /// Returns the first `size` elements of this name.
    pub fn chop(&self, size: usize) -> Self {
        Self {
            elements: self.elements.iter().take(size).cloned().collect(),
        }
    }

    pub fn is_parent_of(&self, other: &PropertyName) -> bool {
        other.elements.len() == self.elements.len() + 1 && self.is_prefix_of(other)
    }

    pub fn is_ancestor_of(&self, other: &PropertyName) -> bool {
        other.elements.len() > self.elements.len() && self.is_prefix_of(other)
    }

    fn is_prefix_of(&self, other: &PropertyName) -> bool {
        self.elements
            .iter()
            .zip(&other.elements)
            .all(|(mine, theirs)| mine == theirs)
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if element.needs_brackets() {
                write!(f, "[{}]", element.text)?;
            } else {
                if i > 0 {
                    f.write_str(".")?;
                }
                f.write_str(&element.text)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for PropertyName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::of(s)
    }
}
