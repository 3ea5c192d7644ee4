//! Shared fixtures: config, records, and in-memory gateway/printer fakes.

use crate::entity::EntityKind;
use crate::gateway::{GatewayError, RecordGateway};
use crate::model::{ConsoleConfig, GroupingKey, Record, RecordId};
use crate::print::{BadgeDocument, PrintError, PrintSubsystem};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_config(base: &str) -> ConsoleConfig {
    ConsoleConfig {
        base_url: base.to_string(),
        entity: EntityKind::Participants,
        grouping: Some(GroupingKey("30".into())),
        user_agent: "fair-console-test".into(),
        request_timeout: Duration::from_secs(5),
        settle_delay: Duration::ZERO,
        print_timeout: Duration::from_millis(200),
        spool_dir: std::env::temp_dir().join("fair-console-test-spool"),
        print_command: None,
        image_base_url: "http://img.test/register_images".into(),
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => Record(map),
        other => panic!("record fixture must be an object, got {other}"),
    }
}

/// Server-side truth for one collection, mutated by status updates, deletes and prints.
#[derive(Default)]
pub struct FakeGateway {
    pub records: Mutex<Vec<Record>>,
    pub groupings: Vec<GroupingKey>,
    pub list_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub detail_calls: Mutex<Vec<RecordId>>,
    pub deleted: Mutex<Vec<RecordId>>,
    pub fail_detail: Mutex<HashSet<RecordId>>,
    pub fail_status: AtomicBool,
}

impl FakeGateway {
    pub fn with_records(records: Vec<Record>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            groupings: vec![GroupingKey("29".into()), GroupingKey("30".into())],
            ..Self::default()
        })
    }

    pub fn fail_detail_for(&self, id: &str) {
        self.fail_detail.lock().unwrap().insert(RecordId::from(id));
    }

    pub fn field_of(&self, id: &str, field: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == Some(RecordId::from(id)))
            .map(|r| r.text(field))
    }

    pub fn mark(&self, id: &RecordId, field: &str, value: &str) {
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.iter_mut().find(|r| r.id().as_ref() == Some(id)) {
            r.set(field, value);
        }
    }
}

#[async_trait]
impl RecordGateway for FakeGateway {
    async fn list(
        &self,
        _entity: EntityKind,
        _grouping: Option<&GroupingKey>,
    ) -> Result<Vec<Record>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.records.lock().unwrap().clone())
    }

    async fn detail(&self, _entity: EntityKind, id: &RecordId) -> Result<Record, GatewayError> {
        self.detail_calls.lock().unwrap().push(id.clone());
        if self.fail_detail.lock().unwrap().contains(id) {
            return Err(GatewayError::Status { status: 500 });
        }
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id().as_ref() == Some(id))
            .cloned()
            .ok_or(GatewayError::Status { status: 404 })
    }

    async fn update_status(
        &self,
        entity: EntityKind,
        id: &RecordId,
        status: &str,
    ) -> Result<Option<Record>, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(GatewayError::Status { status: 500 });
        }
        let field = entity.status_field().ok_or(GatewayError::Unsupported {
            entity,
            operation: "status",
        })?;
        self.mark(id, field, status);
        Ok(None)
    }

    async fn delete(&self, _entity: EntityKind, id: &RecordId) -> Result<(), GatewayError> {
        self.records
            .lock()
            .unwrap()
            .retain(|r| r.id().as_ref() != Some(id));
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn groupings(&self, _entity: EntityKind) -> Result<Vec<GroupingKey>, GatewayError> {
        Ok(self.groupings.clone())
    }
}

/// Records every document it is given. A successful print marks the record "Printed" on the
/// backing gateway, the way the panel does once a badge has gone out.
#[derive(Default)]
pub struct FakePrinter {
    pub printed: Mutex<Vec<String>>,
    pub fail_for: Mutex<HashSet<RecordId>>,
    pub hang: AtomicBool,
    pub backing: Option<Arc<FakeGateway>>,
}

impl FakePrinter {
    pub fn backed_by(gateway: Arc<FakeGateway>) -> Arc<Self> {
        Arc::new(Self {
            backing: Some(gateway),
            ..Self::default()
        })
    }

    pub fn titles(&self) -> Vec<String> {
        self.printed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrintSubsystem for FakePrinter {
    async fn print(&self, doc: &BadgeDocument) -> Result<(), PrintError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_for.lock().unwrap().contains(&doc.record_id) {
            return Err(PrintError::Command("exit status: 1".into()));
        }
        self.printed.lock().unwrap().push(doc.title.clone());
        if let Some(gw) = &self.backing {
            gw.mark(&doc.record_id, "fair_print_status", "Printed");
        }
        Ok(())
    }
}
