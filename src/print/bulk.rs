use super::{render_badge, PrintError, PrintSubsystem};
use crate::entity::EntityKind;
use crate::gateway::RecordGateway;
use crate::model::{ConsoleConfig, ConsoleEvent, PrintProgress, Record, RecordId};
use crate::status::PrintStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkPrintRun {
    /// Another run held the guard; nothing was printed.
    AlreadyRunning,
    Finished { printed: usize, failed: usize, skipped: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Printed,
    Skipped(String),
    Failed(String),
}

/// Ephemeral state for one record inside a run.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: RecordId,
    pub detail: Option<Record>,
    pub outcome: PrintOutcome,
}

impl PrintJob {
    fn progress(&self) -> PrintProgress {
        let id = self.id.clone();
        match &self.outcome {
            PrintOutcome::Printed => PrintProgress::Printed { id },
            PrintOutcome::Skipped(reason) => PrintProgress::Skipped {
                id,
                reason: reason.clone(),
            },
            PrintOutcome::Failed(reason) => PrintProgress::Failed {
                id,
                reason: reason.clone(),
            },
        }
    }
}

/// Ids of the rows in `snapshot` that still need a badge, in snapshot order.
pub fn unprinted(entity: EntityKind, snapshot: &[Record]) -> Vec<RecordId> {
    let Some(field) = entity.print_status_field() else {
        return Vec::new();
    };
    snapshot
        .iter()
        .filter(|r| PrintStatus::from_wire(r.get_str(field)) == PrintStatus::Unprinted)
        .filter_map(Record::id)
        .collect()
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Prints badges strictly one at a time. At most one run (bulk or single) is active.
pub struct BulkPrinter {
    entity: EntityKind,
    gateway: Arc<dyn RecordGateway>,
    printer: Arc<dyn PrintSubsystem>,
    image_base_url: String,
    settle_delay: Duration,
    print_timeout: Duration,
    running: AtomicBool,
}

impl BulkPrinter {
    pub fn new(
        config: &ConsoleConfig,
        gateway: Arc<dyn RecordGateway>,
        printer: Arc<dyn PrintSubsystem>,
    ) -> Self {
        Self {
            entity: config.entity,
            gateway,
            printer,
            image_base_url: config.image_base_url.clone(),
            settle_delay: config.settle_delay,
            print_timeout: config.print_timeout,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// Print every unprinted record of `snapshot`. Rows added or printed elsewhere after the
    /// snapshot was taken are not picked up; a fresh detail showing "Printed" is skipped.
    pub async fn print_unprinted(
        &self,
        snapshot: &[Record],
        events: &mpsc::UnboundedSender<ConsoleEvent>,
    ) -> BulkPrintRun {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("print run already active");
            return BulkPrintRun::AlreadyRunning;
        };
        let pending = unprinted(self.entity, snapshot);
        tracing::info!(count = pending.len(), "bulk print started");

        let mut jobs = Vec::with_capacity(pending.len());
        for (i, id) in pending.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settle_delay).await;
            }
            jobs.push(self.run_job(id, true, events).await);
        }
        let run = summarize(&jobs);
        tracing::info!(?run, "bulk print finished");
        let _ = events.send(ConsoleEvent::PrintRunFinished);
        run
    }

    /// Print a single record, whatever its current print status.
    pub async fn print_one(
        &self,
        id: RecordId,
        events: &mpsc::UnboundedSender<ConsoleEvent>,
    ) -> BulkPrintRun {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!(%id, "print run already active");
            return BulkPrintRun::AlreadyRunning;
        };
        let job = self.run_job(id, false, events).await;
        let _ = events.send(ConsoleEvent::PrintRunFinished);
        summarize(std::slice::from_ref(&job))
    }

    async fn run_job(
        &self,
        id: RecordId,
        skip_printed: bool,
        events: &mpsc::UnboundedSender<ConsoleEvent>,
    ) -> PrintJob {
        let _ = events.send(ConsoleEvent::Print(PrintProgress::Started { id: id.clone() }));
        let mut job = PrintJob {
            id: id.clone(),
            detail: None,
            outcome: PrintOutcome::Printed,
        };
        job.outcome = match self.fetch_and_print(&id, skip_printed, &mut job.detail).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                tracing::warn!(%id, %reason, "badge print failed");
                PrintOutcome::Failed(reason)
            }
        };
        let _ = events.send(ConsoleEvent::Print(job.progress()));
        job
    }

    async fn fetch_and_print(
        &self,
        id: &RecordId,
        skip_printed: bool,
        detail_slot: &mut Option<Record>,
    ) -> Result<PrintOutcome, String> {
        let detail = self
            .gateway
            .detail(self.entity, id)
            .await
            .map_err(|e| format!("detail fetch: {e}"))?;

        if skip_printed {
            let printed = self
                .entity
                .print_status_field()
                .map(|f| PrintStatus::from_wire(detail.get_str(f)) == PrintStatus::Printed)
                .unwrap_or(false);
            if printed {
                tracing::debug!(%id, "already printed since snapshot");
                *detail_slot = Some(detail);
                return Ok(PrintOutcome::Skipped("already printed".into()));
            }
        }

        let doc = render_badge(&detail, &self.image_base_url).map_err(|e| e.to_string())?;
        *detail_slot = Some(detail);

        tokio::time::sleep(self.settle_delay).await;
        match tokio::time::timeout(self.print_timeout, self.printer.print(&doc)).await {
            Ok(Ok(())) => {
                tracing::info!(%id, title = %doc.title, "badge printed");
                Ok(PrintOutcome::Printed)
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(PrintError::Timeout(self.print_timeout).to_string()),
        }
    }
}

fn summarize(jobs: &[PrintJob]) -> BulkPrintRun {
    let mut printed = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for job in jobs {
        match job.outcome {
            PrintOutcome::Printed => printed += 1,
            PrintOutcome::Failed(_) => failed += 1,
            PrintOutcome::Skipped(_) => skipped += 1,
        }
    }
    BulkPrintRun::Finished {
        printed,
        failed,
        skipped,
    }
}

#[cfg(test)]
#[path = "../tests/print_tests.rs"]
mod tests;
