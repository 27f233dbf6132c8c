//! Document paths over nested attribute values.
//!
//! A [`DocumentPath`] is a fully resolved path (placeholders substituted).
//! Reads fail soft: any missing step yields `None`. Writes go through a
//! cursor that walks to the parent slot of the final step; only that final
//! step may be created.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use dynastack_model::AttributeValue;

use super::error::ExpressionError;

/// One step of a document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    /// Map member or top-level attribute.
    Key(String),
    /// List element.
    Index(usize),
}

/// A resolved document path. The first step is always a [`PathStep::Key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    steps: Vec<PathStep>,
}

impl DocumentPath {
    /// Build a path from its steps.
    #[must_use]
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// A path naming one top-level attribute.
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            steps: vec![PathStep::Key(name.into())],
        }
    }

    /// The steps, outermost first.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// The top-level attribute name.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        match self.steps.first() {
            Some(PathStep::Key(name)) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` if the path is a single top-level attribute.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.steps.len() == 1
    }

    /// Returns `true` if one path is a prefix of the other (or they are equal).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.steps
            .iter()
            .zip(&other.steps)
            .all(|(a, b)| a == b)
    }

    /// Returns `true` if the paths diverge at a step where one indexes a list
    /// and the other names a map member.
    #[must_use]
    pub fn conflicts(&self, other: &Self) -> bool {
        for (a, b) in self.steps.iter().zip(&other.steps) {
            match (a, b) {
                (PathStep::Key(x), PathStep::Key(y)) if x == y => {}
                (PathStep::Index(x), PathStep::Index(y)) if x == y => {}
                (PathStep::Key(_), PathStep::Index(_)) | (PathStep::Index(_), PathStep::Key(_)) => {
                    return true;
                }
                _ => return false,
            }
        }
        false
    }

    /// Resolve the path against an item.
    #[must_use]
    pub fn resolve<'a>(
        &self,
        item: &'a HashMap<String, AttributeValue>,
    ) -> Option<&'a AttributeValue> {
        let (first, rest) = self.steps.split_first()?;
        let PathStep::Key(name) = first else {
            return None;
        };
        let mut current = item.get(name)?;
        for step in rest {
            current = match (current, step) {
                (AttributeValue::M(map), PathStep::Key(key)) => map.get(key)?,
                (AttributeValue::L(list), PathStep::Index(idx)) => list.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, creating only the final step.
    ///
    /// Setting a list index at or past the end appends.
    pub fn set(
        &self,
        item: &mut HashMap<String, AttributeValue>,
        value: AttributeValue,
    ) -> Result<(), ExpressionError> {
        match self.cursor(item).map_err(|_| ExpressionError::InvalidDocumentPath)? {
            Slot::Map(map, key) => {
                map.insert(key.to_owned(), value);
            }
            Slot::List(list, idx) => {
                if idx < list.len() {
                    list[idx] = value;
                } else {
                    list.push(value);
                }
            }
        }
        Ok(())
    }

    /// Remove the value at this path, returning it.
    ///
    /// A missing target, including a missing intermediate step, is a no-op.
    /// Walking through a value that is not a container is an error.
    pub fn remove(
        &self,
        item: &mut HashMap<String, AttributeValue>,
    ) -> Result<Option<AttributeValue>, ExpressionError> {
        match self.cursor(item) {
            Ok(Slot::Map(map, key)) => Ok(map.remove(key)),
            Ok(Slot::List(list, idx)) => Ok((idx < list.len()).then(|| list.remove(idx))),
            Err(CursorError::Missing) => Ok(None),
            Err(CursorError::NotContainer) => Err(ExpressionError::InvalidDocumentPath),
        }
    }

    fn cursor<'a>(
        &'a self,
        item: &'a mut HashMap<String, AttributeValue>,
    ) -> Result<Slot<'a>, CursorError> {
        let Some((PathStep::Key(first), rest)) = self.steps.split_first() else {
            return Err(CursorError::NotContainer);
        };
        let Some((last, middle)) = rest.split_last() else {
            return Ok(Slot::Map(item, first));
        };

        let mut current = item.get_mut(first.as_str()).ok_or(CursorError::Missing)?;
        for step in middle {
            current = match (current, step) {
                (AttributeValue::M(map), PathStep::Key(key)) => {
                    map.get_mut(key.as_str()).ok_or(CursorError::Missing)?
                }
                (AttributeValue::L(list), PathStep::Index(idx)) => {
                    list.get_mut(*idx).ok_or(CursorError::Missing)?
                }
                _ => return Err(CursorError::NotContainer),
            };
        }

        match (current, last) {
            (AttributeValue::M(map), PathStep::Key(key)) => Ok(Slot::Map(map, key)),
            (AttributeValue::L(list), PathStep::Index(idx)) => Ok(Slot::List(list, *idx)),
            _ => Err(CursorError::NotContainer),
        }
    }
}

/// Renders as DynamoDB quotes paths in error messages: `[a, b, [1]]`.
impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match step {
                PathStep::Key(key) => f.write_str(key)?,
                PathStep::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        f.write_str("]")
    }
}

/// The parent container of a path's final step.
enum Slot<'a> {
    Map(&'a mut HashMap<String, AttributeValue>, &'a str),
    List(&'a mut Vec<AttributeValue>, usize),
}

enum CursorError {
    Missing,
    NotContainer,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Build a new item holding only the values at `paths`, with their nesting.
///
/// List indices collect the selected elements in index order, so projecting
/// `l[3], l[1]` yields a two-element list `[l[1], l[3]]`.
#[must_use]
pub fn project(
    item: &HashMap<String, AttributeValue>,
    paths: &[DocumentPath],
) -> HashMap<String, AttributeValue> {
    let mut root: BTreeMap<String, Node> = BTreeMap::new();
    for path in paths {
        let Some(value) = path.resolve(item) else {
            continue;
        };
        let Some((PathStep::Key(first), rest)) = path.steps.split_first() else {
            continue;
        };
        let node = root.entry(first.clone()).or_insert_with(|| Node::empty(rest));
        node.insert(rest, value);
    }
    root.into_iter()
        .map(|(name, node)| (name, node.into_value()))
        .collect()
}

enum Node {
    Leaf(AttributeValue),
    Map(BTreeMap<String, Node>),
    List(BTreeMap<usize, Node>),
}

impl Node {
    fn empty(rest: &[PathStep]) -> Self {
        match rest.first() {
            Some(PathStep::Index(_)) => Self::List(BTreeMap::new()),
            _ => Self::Map(BTreeMap::new()),
        }
    }

    fn insert(&mut self, rest: &[PathStep], value: &AttributeValue) {
        let Some((step, tail)) = rest.split_first() else {
            *self = Self::Leaf(value.clone());
            return;
        };
        match (self, step) {
            (Self::Map(children), PathStep::Key(key)) => children
                .entry(key.clone())
                .or_insert_with(|| Self::empty(tail))
                .insert(tail, value),
            (Self::List(children), PathStep::Index(idx)) => children
                .entry(*idx)
                .or_insert_with(|| Self::empty(tail))
                .insert(tail, value),
            // A leaf already covers this value.
            _ => {}
        }
    }

    fn into_value(self) -> AttributeValue {
        match self {
            Self::Leaf(value) => value,
            Self::Map(children) => AttributeValue::M(
                children
                    .into_iter()
                    .map(|(k, n)| (k, n.into_value()))
                    .collect(),
            ),
            Self::List(children) => {
                AttributeValue::L(children.into_values().map(Self::into_value).collect())
            }
        }
    }
}
