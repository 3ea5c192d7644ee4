use crate::cache::FetchStatus;
use crate::entity::EntityKind;
use crate::model::{ConsoleEvent, GroupingKey, PrintProgress, Record, RecordId, Severity};
use crate::status::StatusFilter;
use crate::table::{Projection, TableRow, TableView};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::sync::Arc;

pub enum DetailPane {
    Loading(RecordId),
    Loaded(Box<Record>),
    Failed { id: RecordId, error: String },
}

#[derive(Default)]
pub struct PrintRunView {
    pub current: Option<RecordId>,
    pub printed: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct UiState {
    pub tab: usize,
    pub entity: EntityKind,
    pub restricted: bool,
    pub view: TableView<Record>,
    pub rows: Arc<Vec<Record>>,
    pub fetch: FetchStatus,
    /// Row index within the current page.
    pub cursor: usize,
    pub info: String,
    pub info_severity: Severity,

    pub groupings: Vec<GroupingKey>,
    pub grouping: Option<GroupingKey>,
    pub status: StatusFilter,

    // Text filter input
    pub search: String,
    pub search_editing: bool,

    pub sort_cursor: Option<usize>,
    pub column_cursor: usize,

    pub detail: Option<DetailPane>,
    pub pending_delete: Option<RecordId>,
    pub print_run: Option<PrintRunView>,
}

impl UiState {
    pub fn new(entity: EntityKind, restricted: bool, grouping: Option<GroupingKey>) -> Self {
        Self {
            tab: 0,
            entity,
            restricted,
            view: TableView::for_entity(entity),
            rows: Arc::new(Vec::new()),
            fetch: FetchStatus::Idle,
            cursor: 0,
            info: String::new(),
            info_severity: Severity::Info,
            groupings: Vec::new(),
            grouping,
            status: StatusFilter::All,
            search: String::new(),
            search_editing: false,
            sort_cursor: None,
            column_cursor: 0,
            detail: None,
            pending_delete: None,
            print_run: None,
        }
    }

    pub fn projection(&self) -> Projection<'_, Record> {
        self.view.project(&self.rows)
    }

    /// Record under the cursor on the current page.
    pub fn cursor_row(&self) -> Option<&Record> {
        self.projection().rows.get(self.cursor).copied()
    }

    pub fn cursor_id(&self) -> Option<RecordId> {
        self.cursor_row().and_then(Record::id)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.projection().rows.len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
    }

    pub fn clamp_cursor(&mut self) {
        self.move_cursor(0);
    }

    pub fn set_info(&mut self, severity: Severity, msg: impl Into<String>) {
        self.info = msg.into();
        self.info_severity = severity;
    }

    pub fn replace_rows(&mut self, fetch: FetchStatus, rows: Arc<Vec<Record>>) {
        self.fetch = fetch;
        self.rows = rows;
        self.clamp_cursor();
    }

    pub fn next_page(&mut self) {
        let rows = self.rows.clone();
        self.view.next_page(&rows);
        self.cursor = 0;
    }

    pub fn previous_page(&mut self) {
        let rows = self.rows.clone();
        self.view.previous_page(&rows);
        self.cursor = 0;
    }

    pub fn first_page(&mut self) {
        self.view.set_page(0);
        self.cursor = 0;
    }

    pub fn last_page(&mut self) {
        let last = self.projection().page_count.saturating_sub(1);
        self.view.set_page(last);
        self.cursor = 0;
    }

    pub fn apply_search(&mut self) {
        self.view.set_global_filter(self.search.clone());
        self.cursor = 0;
    }

    /// Step through the sortable columns; past the last one the sort is cleared.
    pub fn cycle_sort(&mut self) {
        let sortable: Vec<&str> = self
            .view
            .columns()
            .iter()
            .filter(|c| c.sortable)
            .map(|c| c.id)
            .collect();
        let next = match self.sort_cursor {
            None if !sortable.is_empty() => Some(0),
            Some(i) if i + 1 < sortable.len() => Some(i + 1),
            _ => None,
        };
        self.sort_cursor = next;
        match next {
            Some(i) => {
                self.view.clear_sort();
                self.view.toggle_sort(sortable[i]);
            }
            None => self.view.clear_sort(),
        }
        self.cursor = 0;
    }

    pub fn toggle_sort_direction(&mut self) {
        if let Some(column) = self.view.sort().map(|s| s.column.clone()) {
            self.view.toggle_sort(&column);
            self.cursor = 0;
        }
    }

    /// Flip visibility of the next hideable column. Returns the column and its new visibility.
    pub fn cycle_column_visibility(&mut self) -> Option<(&'static str, bool)> {
        let columns = self.view.columns();
        if columns.is_empty() {
            return None;
        }
        let col = columns[self.column_cursor % columns.len()];
        self.column_cursor = (self.column_cursor + 1) % columns.len();
        let visible = self.view.toggle_column(col.id);
        Some((col.header, visible))
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.status = status;
        self.view.set_status_filter(status.as_value());
        self.cursor = 0;
    }

    pub fn toggle_selected(&mut self) {
        if let Some(key) = self.cursor_row().and_then(TableRow::key) {
            self.view.toggle_selected(key);
        }
    }

    /// Next grouping after the active one, wrapping.
    pub fn next_grouping(&self) -> Option<GroupingKey> {
        if self.groupings.is_empty() {
            return None;
        }
        let idx = self
            .grouping
            .as_ref()
            .and_then(|g| self.groupings.iter().position(|x| x == g))
            .map(|i| (i + 1) % self.groupings.len())
            .unwrap_or(0);
        Some(self.groupings[idx].clone())
    }

    /// Move to the next event. The new listing starts on its first page.
    pub fn switch_grouping(&mut self) -> Option<GroupingKey> {
        let next = self.next_grouping()?;
        self.grouping = Some(next.clone());
        self.first_page();
        Some(next)
    }

    /// Fold a controller event into the UI state. Listing and in-flight state are read from
    /// the controller by the caller.
    pub fn apply_event(&mut self, ev: ConsoleEvent) {
        match ev {
            ConsoleEvent::Notice(n) => {
                self.set_info(n.severity, n.to_message());
            }
            ConsoleEvent::GroupingsLoaded(list) => {
                self.groupings = list;
            }
            ConsoleEvent::DetailLoaded { id, detail } => {
                let current = match &self.detail {
                    Some(DetailPane::Loading(open)) => open == &id,
                    _ => false,
                };
                if current {
                    self.detail = Some(match detail {
                        Ok(record) => DetailPane::Loaded(record),
                        Err(error) => DetailPane::Failed { id, error },
                    });
                }
            }
            ConsoleEvent::CollectionChanged | ConsoleEvent::AdvanceFinished { .. } => {}
            ConsoleEvent::Print(progress) => {
                let run = self.print_run.get_or_insert_with(PrintRunView::default);
                match progress {
                    PrintProgress::Started { id } => {
                        self.info = format!("Printing {id}…");
                        self.info_severity = Severity::Info;
                        run.current = Some(id);
                    }
                    PrintProgress::Printed { .. } => run.printed += 1,
                    PrintProgress::Skipped { .. } => run.skipped += 1,
                    PrintProgress::Failed { id, reason } => {
                        run.failed += 1;
                        self.info = format!("Print failed for {id}: {reason}");
                        self.info_severity = Severity::Error;
                    }
                }
            }
            ConsoleEvent::PrintRunFinished => {
                self.print_run = None;
            }
        }
    }

    pub fn status_line(&self) -> Line<'static> {
        let color = match self.info_severity {
            Severity::Info => Color::Gray,
            Severity::Success => Color::Green,
            Severity::Error => Color::Red,
        };
        Line::from(Span::styled(self.info.clone(), Style::default().fg(color)))
    }
}

pub fn status_color(status: &str) -> Color {
    match status {
        "Pending" => Color::Yellow,
        "Confirm" => Color::Green,
        "Stall Issued" => Color::Blue,
        "Cancel" => Color::Red,
        "Printed" => Color::Green,
        _ => Color::Gray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Notice;
    use crate::status::ParticipantStatus;
    use crate::test_support::record;
    use serde_json::json;

    fn state_with(n: usize) -> UiState {
        let mut s = UiState::new(EntityKind::Participants, false, None);
        let rows = (1..=n)
            .map(|i| record(json!({"id": i, "name_of_firm": format!("Firm {i:02}"), "profile_status": "Pending"})))
            .collect();
        s.replace_rows(FetchStatus::Success, Arc::new(rows));
        s
    }

    #[test]
    fn cursor_stays_on_current_page() {
        let mut s = state_with(10);
        s.move_cursor(100);
        assert_eq!(s.cursor, 6);
        s.next_page();
        assert_eq!(s.cursor, 0);
        s.move_cursor(100);
        assert_eq!(s.cursor, 2);
        assert_eq!(s.cursor_id(), Some(RecordId::from("10")));
        s.move_cursor(-5);
        assert_eq!(s.cursor, 0);
        s.first_page();
        assert_eq!(s.cursor_id(), Some(RecordId::from("1")));
        s.last_page();
        assert_eq!(s.projection().page_index, 1);
    }

    #[test]
    fn sort_cycle_ends_unsorted() {
        let mut s = state_with(3);
        s.cycle_sort();
        assert_eq!(s.view.sort().map(|x| x.column.as_str()), Some("name_of_firm"));
        s.toggle_sort_direction();
        assert_eq!(s.cursor_id(), Some(RecordId::from("3")));
        s.cycle_sort();
        assert!(s.view.sort().is_none());
    }

    #[test]
    fn detail_from_older_open_is_ignored() {
        let mut s = state_with(2);
        s.detail = Some(DetailPane::Loading(RecordId::from("2")));
        s.apply_event(ConsoleEvent::DetailLoaded {
            id: RecordId::from("1"),
            detail: Ok(Box::new(record(json!({"id": 1})))),
        });
        assert!(matches!(s.detail, Some(DetailPane::Loading(_))));
        s.apply_event(ConsoleEvent::DetailLoaded {
            id: RecordId::from("2"),
            detail: Err("HTTP 500".into()),
        });
        assert!(matches!(s.detail, Some(DetailPane::Failed { .. })));
    }

    #[test]
    fn events_update_info_and_progress() {
        let mut s = state_with(1);
        s.apply_event(ConsoleEvent::Notice(Notice::error("Error", "boom")));
        assert_eq!(s.info, "Error: boom");
        s.apply_event(ConsoleEvent::Print(PrintProgress::Started { id: RecordId::from("1") }));
        s.apply_event(ConsoleEvent::Print(PrintProgress::Printed { id: RecordId::from("1") }));
        assert_eq!(s.print_run.as_ref().map(|r| r.printed), Some(1));
        s.apply_event(ConsoleEvent::PrintRunFinished);
        assert!(s.print_run.is_none());
    }

    #[test]
    fn status_and_grouping_cycle() {
        let mut s = state_with(3);
        s.set_status(StatusFilter::Only(ParticipantStatus::Confirm));
        assert_eq!(s.projection().total_filtered, 0);
        assert!(s.next_grouping().is_none());
        s.groupings = vec![GroupingKey("29".into()), GroupingKey("30".into())];
        s.grouping = Some(GroupingKey("30".into()));
        assert_eq!(s.next_grouping(), Some(GroupingKey("29".into())));
    }

    #[test]
    fn switching_event_returns_to_first_page() {
        let mut s = state_with(20);
        s.next_page();
        s.next_page();
        s.move_cursor(3);
        assert_eq!(s.projection().page_index, 2);

        s.groupings = vec![GroupingKey("29".into()), GroupingKey("30".into())];
        s.grouping = Some(GroupingKey("30".into()));
        assert_eq!(s.switch_grouping(), Some(GroupingKey("29".into())));
        assert_eq!(s.grouping, Some(GroupingKey("29".into())));
        assert_eq!(s.projection().page_index, 0);
        assert_eq!(s.cursor, 0);
    }
}
