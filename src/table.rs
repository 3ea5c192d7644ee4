//! Table view model shared by every list page.
//!
//! `TableView` owns the presentation controls (sort, filters, visibility, selection, page)
//! and `project` turns a record slice into the rows for the current page. The record slice
//! is never modified; every projection is recomputed from scratch.

use crate::entity::{Column, EntityKind};
use crate::model::{Record, RecordId};
use crate::status::{tally, ParticipantStatus};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// A row the table can display, filter and select.
pub trait TableRow {
    type Key: Clone + Ord + std::fmt::Debug;

    /// Rows without a key are shown but cannot be selected.
    fn key(&self) -> Option<Self::Key>;

    fn cell(&self, column: &str) -> String;

    /// Every field value, used by the unscoped text filter.
    fn search_values(&self) -> Vec<String>;
}

impl TableRow for Record {
    type Key = RecordId;

    fn key(&self) -> Option<RecordId> {
        self.id()
    }

    fn cell(&self, column: &str) -> String {
        self.text(column)
    }

    fn search_values(&self) -> Vec<String> {
        self.fields().map(|(_, v)| v).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

/// One page worth of rows plus the counters the footer needs.
#[derive(Debug)]
pub struct Projection<'a, R> {
    pub rows: Vec<&'a R>,
    pub total_filtered: usize,
    pub selected_count: usize,
    pub page_index: usize,
    pub page_count: usize,
    pub can_previous: bool,
    pub can_next: bool,
}

#[derive(Debug, Clone)]
pub struct TableView<R: TableRow> {
    columns: &'static [Column],
    page_size: usize,
    status_column: Option<&'static str>,
    sort: Option<SortSpec>,
    column_filters: BTreeMap<String, String>,
    global_filter: String,
    filter_scope: Option<String>,
    status_filter: Option<String>,
    hidden: BTreeSet<String>,
    selection: BTreeSet<R::Key>,
    page_index: usize,
}

impl TableView<Record> {
    pub fn for_entity(entity: EntityKind) -> Self {
        Self::new(entity.columns(), entity.page_size(), entity.status_field())
    }
}

impl<R: TableRow> TableView<R> {
    pub fn new(
        columns: &'static [Column],
        page_size: usize,
        status_column: Option<&'static str>,
    ) -> Self {
        Self {
            columns,
            page_size: page_size.max(1),
            status_column,
            sort: None,
            column_filters: BTreeMap::new(),
            global_filter: String::new(),
            filter_scope: None,
            status_filter: None,
            hidden: BTreeSet::new(),
            selection: BTreeSet::new(),
            page_index: 0,
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn global_filter(&self) -> &str {
        &self.global_filter
    }

    pub fn status_filter(&self) -> Option<&str> {
        self.status_filter.as_deref()
    }

    /// Sort by `column`, flipping direction if it is already the active sort.
    pub fn toggle_sort(&mut self, column: &str) {
        self.sort = match self.sort.take() {
            Some(s) if s.column == column => Some(SortSpec {
                column: s.column,
                descending: !s.descending,
            }),
            _ => Some(SortSpec {
                column: column.to_string(),
                descending: false,
            }),
        };
        self.page_index = 0;
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.page_index = 0;
    }

    pub fn set_global_filter(&mut self, query: impl Into<String>) {
        self.global_filter = query.into();
        self.page_index = 0;
    }

    /// Restrict the text filter to one column, or search every field with `None`.
    pub fn scope_global_filter(&mut self, column: Option<&str>) {
        self.filter_scope = column.map(str::to_string);
        self.page_index = 0;
    }

    pub fn set_column_filter(&mut self, column: &str, needle: impl Into<String>) {
        let needle = needle.into();
        if needle.is_empty() {
            self.column_filters.remove(column);
        } else {
            self.column_filters.insert(column.to_string(), needle);
        }
        self.page_index = 0;
    }

    /// Exact-match filter on the status column, applied before counting and paging.
    pub fn set_status_filter(&mut self, status: Option<&str>) {
        self.status_filter = status.map(str::to_string);
        self.page_index = 0;
    }

    pub fn is_visible(&self, column: &str) -> bool {
        !self.hidden.contains(column)
    }

    /// Flip a hideable column. Returns the new visibility.
    pub fn toggle_column(&mut self, column: &str) -> bool {
        let hideable = self
            .columns
            .iter()
            .any(|c| c.id == column && c.hideable);
        if !hideable {
            return true;
        }
        if !self.hidden.remove(column) {
            self.hidden.insert(column.to_string());
            return false;
        }
        true
    }

    pub fn visible_columns(&self) -> Vec<&'static Column> {
        self.columns
            .iter()
            .filter(|c| self.is_visible(c.id))
            .collect()
    }

    pub fn toggle_selected(&mut self, key: R::Key) {
        if !self.selection.remove(&key) {
            self.selection.insert(key);
        }
    }

    pub fn is_selected(&self, key: &R::Key) -> bool {
        self.selection.contains(key)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_page(&mut self, index: usize) {
        self.page_index = index;
    }

    pub fn next_page(&mut self, rows: &[R]) {
        let p = self.project(rows);
        if p.can_next {
            self.page_index = p.page_index + 1;
        }
    }

    pub fn previous_page(&mut self, rows: &[R]) {
        let p = self.project(rows);
        self.page_index = p.page_index.saturating_sub(1);
    }

    /// Per-status counts over every row, ignoring all filters. `None` without a status column.
    pub fn status_counts(&self, rows: &[R]) -> Option<[(ParticipantStatus, usize); 4]> {
        let col = self.status_column?;
        let cells: Vec<String> = rows.iter().map(|r| r.cell(col)).collect();
        Some(tally(cells.iter().map(String::as_str)))
    }

    fn matches(&self, row: &R) -> bool {
        if let (Some(col), Some(want)) = (self.status_column, self.status_filter.as_deref()) {
            if row.cell(col) != want {
                return false;
            }
        }
        for (col, needle) in &self.column_filters {
            if !contains_ci(&row.cell(col), needle) {
                return false;
            }
        }
        if self.global_filter.is_empty() {
            return true;
        }
        match self.filter_scope.as_deref() {
            Some(col) => contains_ci(&row.cell(col), &self.global_filter),
            None => row
                .search_values()
                .iter()
                .any(|v| contains_ci(v, &self.global_filter)),
        }
    }

    /// Filter, sort and paginate `rows`. The page index is clamped to the available pages.
    pub fn project<'a>(&self, rows: &'a [R]) -> Projection<'a, R> {
        let mut filtered: Vec<&'a R> = rows.iter().filter(|r| self.matches(r)).collect();

        if let Some(sort) = &self.sort {
            // sort_by is stable, so ties keep collection order in both directions.
            filtered.sort_by(|a, b| {
                let ord = compare_cells(&a.cell(&sort.column), &b.cell(&sort.column));
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let total_filtered = filtered.len();
        let selected_count = filtered
            .iter()
            .filter_map(|r| r.key())
            .filter(|k| self.selection.contains(k))
            .count();
        let page_count = total_filtered.div_ceil(self.page_size);
        let page_index = self.page_index.min(page_count.saturating_sub(1));
        let rows = filtered
            .into_iter()
            .skip(page_index * self.page_size)
            .take(self.page_size)
            .collect();

        Projection {
            rows,
            total_filtered,
            selected_count,
            page_index,
            page_count,
            can_previous: page_index > 0,
            can_next: page_index + 1 < page_count,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Numbers compare numerically, everything else case-insensitively.
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
