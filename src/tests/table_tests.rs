use super::*;
use crate::test_support::record;
use serde_json::json;

fn participants() -> Vec<Record> {
    vec![
        record(json!({"id": 1, "name_of_firm": "Zenith Knits", "rep1_mobile": "9840011111", "profile_status": "Pending"})),
        record(json!({"id": 2, "name_of_firm": "acme threads", "rep1_mobile": "9840022222", "profile_status": "Confirm"})),
        record(json!({"id": 3, "name_of_firm": "Bharat Mills", "rep1_mobile": "9840033333", "profile_status": "Pending"})),
        record(json!({"id": 4, "name_of_firm": "Acme Threads", "rep1_mobile": "9840044444", "profile_status": "Cancel"})),
        record(json!({"id": 5, "name_of_firm": "Coimbatore Cotton", "rep1_mobile": "9840055555", "profile_status": "Stall Issued"})),
    ]
}

fn ids(p: &Projection<'_, Record>) -> Vec<String> {
    p.rows.iter().map(|r| r.text("id")).collect()
}

fn wide_view() -> TableView<Record> {
    TableView::new(
        EntityKind::Participants.columns(),
        100,
        EntityKind::Participants.status_field(),
    )
}

#[test]
fn no_controls_keeps_every_row_in_collection_order() {
    let rows = participants();
    let view = wide_view();
    let p = view.project(&rows);
    assert_eq!(p.total_filtered, rows.len());
    assert_eq!(ids(&p), ["1", "2", "3", "4", "5"]);
    assert!(!p.can_previous);
    assert!(!p.can_next);
}

#[test]
fn status_filter_applies_before_counting() {
    let rows = participants();
    let mut view = TableView::<Record>::for_entity(EntityKind::Participants);
    view.set_status_filter(Some("Pending"));
    let p = view.project(&rows);
    assert_eq!(p.total_filtered, 2);
    assert_eq!(p.page_count, 1);
    assert!(p.rows.iter().all(|r| r.text("profile_status") == "Pending"));
}

#[test]
fn changing_filters_resets_the_page() {
    let rows: Vec<Record> = (1..=20)
        .map(|i| record(json!({"id": i, "profile_status": if i % 2 == 0 { "Confirm" } else { "Pending" }})))
        .collect();
    let mut view = TableView::<Record>::for_entity(EntityKind::Participants);
    view.next_page(&rows);
    view.next_page(&rows);
    assert_eq!(view.project(&rows).page_index, 2);

    view.set_status_filter(Some("Confirm"));
    assert_eq!(view.project(&rows).page_index, 0);

    view.next_page(&rows);
    view.set_global_filter("1");
    assert_eq!(view.project(&rows).page_index, 0);
}

#[test]
fn text_filter_finds_mobile_number_case_insensitively() {
    let mut rows = participants();
    rows.push(record(json!({"id": 6, "name_of_firm": "Delta", "rep1_mobile": "MOB-XY9", "profile_status": "Pending"})));
    let mut view = wide_view();

    view.set_global_filter("9840033");
    assert_eq!(ids(&view.project(&rows)), ["3"]);

    view.set_global_filter("mob-xy");
    assert_eq!(ids(&view.project(&rows)), ["6"]);
}

#[test]
fn scoped_text_filter_ignores_other_columns() {
    let rows = participants();
    let mut view = wide_view();
    view.set_global_filter("4");
    assert_eq!(view.project(&rows).total_filtered, 5);

    view.scope_global_filter(Some("id"));
    assert_eq!(ids(&view.project(&rows)), ["4"]);
}

#[test]
fn column_filters_combine() {
    let rows = participants();
    let mut view = wide_view();
    view.set_column_filter("name_of_firm", "acme");
    assert_eq!(ids(&view.project(&rows)), ["2", "4"]);
    view.set_column_filter("profile_status", "cancel");
    assert_eq!(ids(&view.project(&rows)), ["4"]);
    view.set_column_filter("profile_status", "");
    assert_eq!(view.project(&rows).total_filtered, 2);
}

#[test]
fn sort_is_stable_in_both_directions() {
    let rows = participants();
    let mut view = wide_view();

    view.toggle_sort("name_of_firm");
    assert_eq!(ids(&view.project(&rows)), ["2", "4", "3", "5", "1"]);

    view.toggle_sort("name_of_firm");
    assert_eq!(view.sort().map(|s| s.descending), Some(true));
    assert_eq!(ids(&view.project(&rows)), ["1", "5", "3", "2", "4"]);

    view.clear_sort();
    assert_eq!(ids(&view.project(&rows)), ["1", "2", "3", "4", "5"]);
}

#[test]
fn numeric_cells_sort_numerically() {
    let rows: Vec<Record> = [10, 9, 100]
        .into_iter()
        .map(|i| record(json!({"id": i})))
        .collect();
    let mut view = wide_view();
    view.toggle_sort("id");
    assert_eq!(ids(&view.project(&rows)), ["9", "10", "100"]);
}

#[test]
fn page_index_is_clamped_to_available_pages() {
    let rows = participants();
    let mut view = TableView::<Record>::for_entity(EntityKind::Participants);
    view.set_page(40);
    let p = view.project(&rows);
    assert_eq!(p.page_index, 0);
    assert_eq!(p.page_count, 1);
    assert_eq!(p.rows.len(), 5);

    let empty: Vec<Record> = Vec::new();
    let p = view.project(&empty);
    assert_eq!(p.page_index, 0);
    assert_eq!(p.page_count, 0);
    assert!(!p.can_next);
}

#[test]
fn pages_split_by_entity_page_size() {
    let rows: Vec<Record> = (1..=15).map(|i| record(json!({"id": i}))).collect();
    let mut view = TableView::<Record>::for_entity(EntityKind::Participants);
    let first = view.project(&rows);
    assert_eq!(first.rows.len(), 7);
    assert_eq!(first.page_count, 3);
    assert!(first.can_next);

    view.next_page(&rows);
    view.next_page(&rows);
    view.next_page(&rows);
    let last = view.project(&rows);
    assert_eq!(last.page_index, 2);
    assert_eq!(ids(&last), ["15"]);
    assert!(last.can_previous);
    assert!(!last.can_next);

    view.previous_page(&rows);
    assert_eq!(view.project(&rows).page_index, 1);
}

#[test]
fn selection_and_visibility_survive_reprojection() {
    let rows = participants();
    let mut view = wide_view();
    view.toggle_selected(RecordId::from("2"));
    view.toggle_selected(RecordId::from("4"));
    assert!(!view.toggle_column("brand_name"));

    view.set_global_filter("acme");
    let p = view.project(&rows);
    assert_eq!(p.selected_count, 2);

    view.set_status_filter(Some("Cancel"));
    assert_eq!(view.project(&rows).selected_count, 1);
    assert!(view.is_selected(&RecordId::from("2")));
    assert!(!view.is_visible("brand_name"));
    assert!(view
        .visible_columns()
        .iter()
        .all(|c| c.id != "brand_name"));

    assert!(view.toggle_column("brand_name"));
    assert!(view.is_visible("brand_name"));
}

#[test]
fn projection_does_not_touch_records() {
    let rows = participants();
    let before = rows.clone();
    let mut view = wide_view();
    view.toggle_sort("name_of_firm");
    view.set_global_filter("a");
    let _ = view.project(&rows);
    assert_eq!(rows, before);
}

#[test]
fn status_counts_ignore_active_filters() {
    let rows = participants();
    let mut view = TableView::<Record>::for_entity(EntityKind::Participants);
    view.set_status_filter(Some("Cancel"));
    view.set_global_filter("zenith");
    let counts = view.status_counts(&rows).unwrap();
    assert_eq!(counts[0], (ParticipantStatus::Pending, 2));
    assert_eq!(counts[2], (ParticipantStatus::StallIssued, 1));

    let regs = TableView::<Record>::for_entity(EntityKind::Registrations);
    assert!(regs.status_counts(&rows).is_none());
}
