//! Query and scan engine.
//!
//! Both operations walk an [`ItemTree`] (the primary store or a secondary
//! index) in key order, starting strictly after `ExclusiveStartKey`, and stop
//! at `Limit` candidates or once the page reaches its byte ceiling.
//! `LastEvaluatedKey` is fixed before the filter and the projection run, so
//! a page whose candidates are all filtered out still resumes correctly.

use std::collections::btree_map;
use std::iter::Peekable;
use std::ops::Bound;

use tracing::trace;

use dynastack_model::types::Item;

use crate::expression::{
    DocumentPath, Expr, ExpressionError, ExpressionKind, KeyCondition, RequestExpressions,
    project,
};
use crate::storage::{
    ItemTree, KeySchema, KeyValue, RangeKey, StorageError, calculate_item_size,
    extract_primary_key, parse_key,
};

/// Largest candidate volume read into one page (1 MB).
pub const MAX_PAGE_SIZE: u64 = 1024 * 1024;

/// An index a read walks, primary or secondary.
#[derive(Debug, Clone, Copy)]
pub struct IndexView<'a> {
    /// Index name, `None` for the primary index.
    pub name: Option<&'a str>,
    /// Key schema of the index.
    pub key_schema: &'a KeySchema,
    /// Key schema of the owning table.
    pub table_schema: &'a KeySchema,
    /// Entries in index order.
    pub items: &'a ItemTree,
}

impl IndexView<'_> {
    /// Returns `true` for a secondary index.
    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.name.is_some()
    }

    /// The `LastEvaluatedKey` for a candidate: the table key, plus the index
    /// key for secondary indexes.
    #[must_use]
    pub fn last_key(&self, item: &Item) -> Item {
        let mut key = self.table_schema.key_of(item);
        if self.is_secondary() {
            key.extend(self.key_schema.key_of(item));
        }
        key
    }

    /// Where in the tree an `ExclusiveStartKey` points.
    fn start_position(&self, start: &Item) -> Result<(KeyValue, RangeKey), StorageError> {
        if !self.is_secondary() {
            let key = parse_key(self.table_schema, start).map_err(|_| StorageError::InvalidStartKey)?;
            let range = key.range_key();
            return Ok((key.partition_key, range));
        }

        let expected = self.last_key(start);
        if expected.len() != start.len() {
            return Err(StorageError::InvalidStartKey);
        }
        let table_key =
            extract_primary_key(self.table_schema, start).map_err(|_| StorageError::InvalidStartKey)?;
        let index_key =
            extract_primary_key(self.key_schema, start).map_err(|_| StorageError::InvalidStartKey)?;
        Ok((
            index_key.partition_key,
            RangeKey {
                range: index_key.sort_key,
                table_key: Some(table_key),
            },
        ))
    }
}

/// Page ceilings for one read.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    /// Maximum candidates (`Limit`).
    pub limit: Option<usize>,
    /// Maximum candidate bytes.
    pub max_bytes: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            limit: None,
            max_bytes: MAX_PAGE_SIZE,
        }
    }
}

/// One parallel-scan segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// This worker's segment, below `total`.
    pub segment: u32,
    /// `TotalSegments`.
    pub total: u32,
}

impl Segment {
    /// Returns `true` if the hash group belongs to this segment.
    #[must_use]
    pub fn contains(&self, hash: &KeyValue) -> bool {
        hash.stable_hash() % self.total == self.segment
    }
}

/// Candidates selected for one page.
#[derive(Debug, Default)]
pub struct Page<'a> {
    /// Candidates in walk order, before filtering.
    pub candidates: Vec<&'a Item>,
    /// Where the next page starts, when candidates remain.
    pub last_evaluated_key: Option<Item>,
}

/// The filtered, projected result of a page.
#[derive(Debug, Default)]
pub struct ReadResult {
    /// Returned items (empty for `Select=COUNT`).
    pub items: Vec<Item>,
    /// Items that passed the filter.
    pub count: usize,
    /// Candidates evaluated.
    pub scanned_count: usize,
    /// Where the next page starts.
    pub last_evaluated_key: Option<Item>,
}

impl Page<'_> {
    /// Apply the filter, then the projection.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` if the filter fails to evaluate.
    pub fn finish(
        self,
        exprs: &RequestExpressions<'_>,
        filter: Option<&Expr>,
        projection: Option<&[DocumentPath]>,
        count_only: bool,
    ) -> Result<ReadResult, ExpressionError> {
        let scanned_count = self.candidates.len();
        let mut items = Vec::new();
        let mut count = 0;
        for item in self.candidates {
            if let Some(filter) = filter {
                if !exprs.context(item, ExpressionKind::Filter).evaluate(filter)? {
                    continue;
                }
            }
            count += 1;
            if !count_only {
                items.push(projection.map_or_else(|| item.clone(), |paths| project(item, paths)));
            }
        }
        Ok(ReadResult {
            items,
            count,
            scanned_count,
            last_evaluated_key: self.last_evaluated_key,
        })
    }
}

/// Select the candidates of a query page.
///
/// # Errors
///
/// Returns `InvalidStartKey` for a malformed `ExclusiveStartKey` and
/// `StartKeyOutOfBounds` when it names another hash key.
pub fn query<'a>(
    view: IndexView<'a>,
    condition: &KeyCondition,
    forward: bool,
    start: Option<&Item>,
    limits: PageLimits,
) -> Result<Page<'a>, StorageError> {
    let start = start.map(|s| view.start_position(s)).transpose()?;
    let Some(hash) = KeyValue::from_attribute(&condition.hash_value) else {
        return Ok(Page::default());
    };
    if start.as_ref().is_some_and(|(h, _)| *h != hash) {
        return Err(StorageError::StartKeyOutOfBounds);
    }
    let Some(group) = view.items.group(&hash) else {
        return Ok(Page::default());
    };

    let after = start.as_ref().map(|(_, range)| range);
    let entries: Box<dyn Iterator<Item = (&RangeKey, &Item)> + '_> = match (forward, after) {
        (true, Some(r)) => Box::new(group.range((Bound::Excluded(r), Bound::Unbounded))),
        (true, None) => Box::new(group.iter()),
        (false, Some(r)) => Box::new(group.range((Bound::Unbounded, Bound::Excluded(r))).rev()),
        (false, None) => Box::new(group.iter().rev()),
    };

    let sort_key = view.key_schema.sort_key.as_ref().map(|k| k.name.as_str());
    let candidates = entries.map(|(_, item)| item).filter(|item| {
        match (&condition.range, sort_key) {
            (Some(range), Some(name)) => item.get(name).is_some_and(|v| range.matches(v)),
            _ => true,
        }
    });
    Ok(collect_page(view, candidates.peekable(), limits))
}

/// Select the candidates of a scan page.
///
/// # Errors
///
/// Returns `InvalidStartKey` for a malformed `ExclusiveStartKey`.
pub fn scan<'a>(
    view: IndexView<'a>,
    segment: Option<Segment>,
    start: Option<&Item>,
    limits: PageLimits,
) -> Result<Page<'a>, StorageError> {
    let start = start.map(|s| view.start_position(s)).transpose()?;
    let (start_hash, start_range) = match &start {
        Some((hash, range)) => (Some(hash), Some(range)),
        None => (None, None),
    };

    let candidates = view
        .items
        .groups_from(start_hash)
        .filter(|(hash, _)| segment.is_none_or(|s| s.contains(hash)))
        .flat_map(|(hash, group)| -> btree_map::Range<'a, RangeKey, Item> {
            match start_range {
                Some(range) if Some(hash) == start_hash => {
                    group.range((Bound::Excluded(range), Bound::Unbounded))
                }
                _ => group.range::<RangeKey, _>(..),
            }
        })
        .map(|(_, item)| item);
    Ok(collect_page(view, candidates.peekable(), limits))
}

fn collect_page<'a, I>(view: IndexView<'a>, mut iter: Peekable<I>, limits: PageLimits) -> Page<'a>
where
    I: Iterator<Item = &'a Item>,
{
    let mut page = Page::default();
    let mut bytes = 0;
    while let Some(item) = iter.next() {
        bytes += calculate_item_size(item);
        page.candidates.push(item);
        let full = limits.limit.is_some_and(|l| page.candidates.len() >= l) || bytes >= limits.max_bytes;
        if full {
            if iter.peek().is_some() {
                page.last_evaluated_key = Some(view.last_key(item));
            }
            break;
        }
    }
    trace!(
        candidates = page.candidates.len(),
        bytes,
        more = page.last_evaluated_key.is_some(),
        "collected page"
    );
    page
}
