use super::*;
use crate::test_support::{record, test_config, FakeGateway, FakePrinter};
use serde_json::json;

fn registrations() -> Vec<Record> {
    vec![
        record(json!({"id": 1, "fair_firm_name": "Acme", "fair_person_name": "Anil", "fair_print_status": ""})),
        record(json!({"id": 2, "fair_firm_name": "Globex", "fair_person_name": "Bina", "fair_print_status": null})),
        record(json!({"id": 3, "fair_firm_name": "Initech", "fair_person_name": "Chitra"})),
        record(json!({"id": 4, "fair_firm_name": "Umbrella", "fair_person_name": "Dev", "fair_print_status": "Printed"})),
    ]
}

fn printer_for(gateway: Arc<FakeGateway>, printer: Arc<FakePrinter>) -> BulkPrinter {
    let mut cfg = test_config("http://unused");
    cfg.entity = EntityKind::Registrations;
    BulkPrinter::new(&cfg, gateway, printer)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ConsoleEvent>) -> Vec<ConsoleEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[test]
fn unprinted_keeps_snapshot_order_and_ignores_printed() {
    let ids: Vec<String> = unprinted(EntityKind::Registrations, &registrations())
        .into_iter()
        .map(|id| id.0)
        .collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert!(unprinted(EntityKind::Participants, &registrations()).is_empty());
}

#[tokio::test]
async fn failed_detail_does_not_stop_the_run() {
    let gateway = FakeGateway::with_records(registrations());
    gateway.fail_detail_for("2");
    let printer = FakePrinter::backed_by(gateway.clone());
    let bulk = printer_for(gateway.clone(), printer.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let snapshot = gateway.records.lock().unwrap().clone();
    let run = bulk.print_unprinted(&snapshot, &tx).await;

    assert_eq!(
        run,
        BulkPrintRun::Finished {
            printed: 2,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(printer.titles(), ["Registration-Anil", "Registration-Chitra"]);

    let requery = gateway.records.lock().unwrap().clone();
    let still: Vec<String> = unprinted(EntityKind::Registrations, &requery)
        .into_iter()
        .map(|id| id.0)
        .collect();
    assert_eq!(still, ["2"]);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ConsoleEvent::Print(PrintProgress::Failed { id, .. }) if id.0 == "2"
    )));
    assert!(matches!(events.last(), Some(ConsoleEvent::PrintRunFinished)));
}

#[tokio::test]
async fn records_are_printed_strictly_in_sequence() {
    let gateway = FakeGateway::with_records(registrations());
    let printer = FakePrinter::backed_by(gateway.clone());
    let bulk = printer_for(gateway.clone(), printer);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let snapshot = gateway.records.lock().unwrap().clone();
    bulk.print_unprinted(&snapshot, &tx).await;

    let order: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ConsoleEvent::Print(PrintProgress::Started { id }) => Some(format!("start {id}")),
            ConsoleEvent::Print(PrintProgress::Printed { id }) => Some(format!("done {id}")),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        ["start 1", "done 1", "start 2", "done 2", "start 3", "done 3"]
    );
}

#[tokio::test]
async fn second_run_while_active_is_a_no_op() {
    let gateway = FakeGateway::with_records(registrations());
    let printer = FakePrinter::backed_by(gateway.clone());
    printer.hang.store(true, std::sync::atomic::Ordering::SeqCst);
    let bulk = printer_for(gateway.clone(), printer);
    let (tx, _rx) = mpsc::unbounded_channel();
    let snapshot = gateway.records.lock().unwrap().clone();

    let (first, second) = tokio::join!(bulk.print_unprinted(&snapshot, &tx), async {
        tokio::task::yield_now().await;
        assert!(bulk.is_running());
        bulk.print_one(RecordId::from("4"), &tx).await
    });

    assert_eq!(second, BulkPrintRun::AlreadyRunning);
    // Every hung print hits the timeout and counts as a failure.
    assert_eq!(
        first,
        BulkPrintRun::Finished {
            printed: 0,
            failed: 3,
            skipped: 0
        }
    );
    assert!(!bulk.is_running());
}

#[tokio::test]
async fn record_printed_since_snapshot_is_skipped() {
    let gateway = FakeGateway::with_records(registrations());
    let printer = FakePrinter::backed_by(gateway.clone());
    let bulk = printer_for(gateway.clone(), printer.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    let snapshot = gateway.records.lock().unwrap().clone();
    gateway.mark(&RecordId::from("1"), "fair_print_status", "Printed");
    let run = bulk.print_unprinted(&snapshot, &tx).await;

    assert_eq!(
        run,
        BulkPrintRun::Finished {
            printed: 2,
            failed: 0,
            skipped: 1
        }
    );
    assert_eq!(printer.titles().len(), 2);
}

#[tokio::test]
async fn print_one_reprints_an_already_printed_record() {
    let gateway = FakeGateway::with_records(registrations());
    let printer = FakePrinter::backed_by(gateway.clone());
    let bulk = printer_for(gateway.clone(), printer.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    let run = bulk.print_one(RecordId::from("4"), &tx).await;
    assert_eq!(
        run,
        BulkPrintRun::Finished {
            printed: 1,
            failed: 0,
            skipped: 0
        }
    );
    assert_eq!(printer.titles(), ["Registration-Dev"]);
}
