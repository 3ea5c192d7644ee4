//! One list page bound to the cache, the status workflow and the printer.

use crate::cache::{CacheEntry, CacheKey, CachePrefix, FetchStatus, QueryCache};
use crate::entity::{EntityKind, Route};
use crate::gateway::{GatewayError, RecordGateway};
use crate::model::{ConsoleConfig, ConsoleEvent, GroupingKey, Notice, Record, RecordId};
use crate::print::{self, BulkPrintRun, BulkPrinter, PrintSubsystem};
use crate::session::Session;
use crate::status::{ParticipantStatus, StatusFilter};
use crate::workflow::{StatusWorkflow, WorkflowError};
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Answer to the "are you sure" prompt in front of destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action rejected: {0}")]
    ActionRejected(String),
    #[error("not permitted for this user")]
    Restricted,
    #[error("{entity:?} does not support {operation}")]
    Unsupported {
        entity: EntityKind,
        operation: &'static str,
    },
    #[error("record {0} is not in the current listing")]
    UnknownRecord(RecordId),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Scope {
    grouping: Option<GroupingKey>,
    status: StatusFilter,
}

pub struct ListController {
    entity: EntityKind,
    session: Session,
    gateway: Arc<dyn RecordGateway>,
    cache: Arc<QueryCache>,
    workflow: StatusWorkflow,
    printer: Option<BulkPrinter>,
    events: UnboundedSender<ConsoleEvent>,
    scope: Mutex<Scope>,
    advancing: Mutex<HashSet<RecordId>>,
    selected: Mutex<Option<RecordId>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ListController {
    pub fn new(
        config: &ConsoleConfig,
        session: Session,
        gateway: Arc<dyn RecordGateway>,
        cache: Arc<QueryCache>,
        printer: Option<Arc<dyn PrintSubsystem>>,
        events: UnboundedSender<ConsoleEvent>,
    ) -> Self {
        let entity = config.entity;
        let grouping = if entity.supports_groupings() {
            config.grouping.clone().or_else(|| entity.default_grouping())
        } else {
            None
        };
        let printer = printer
            .filter(|_| entity.supports_printing())
            .map(|p| BulkPrinter::new(config, gateway.clone(), p));
        Self {
            entity,
            session,
            workflow: StatusWorkflow::new(gateway.clone(), cache.clone(), events.clone()),
            gateway,
            cache,
            printer,
            events,
            scope: Mutex::new(Scope {
                grouping,
                status: StatusFilter::All,
            }),
            advancing: Mutex::new(HashSet::new()),
            selected: Mutex::new(None),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn grouping(&self) -> Option<GroupingKey> {
        lock(&self.scope).grouping.clone()
    }

    pub fn status_filter(&self) -> StatusFilter {
        lock(&self.scope).status
    }

    pub fn is_restricted(&self) -> bool {
        self.session.is_restricted()
    }

    pub fn is_printing(&self) -> bool {
        self.printer.as_ref().is_some_and(BulkPrinter::is_running)
    }

    pub fn current_key(&self) -> CacheKey {
        let scope = lock(&self.scope);
        CacheKey::new(self.entity.collection(), scope.grouping.clone(), scope.status)
    }

    fn emit(&self, event: ConsoleEvent) {
        let _ = self.events.send(event);
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(ConsoleEvent::Notice(notice));
    }

    fn list_fetch(
        &self,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<Vec<Record>, GatewayError>>
    {
        let gateway = self.gateway.clone();
        let entity = self.entity;
        let grouping = self.grouping();
        // The whole grouping is fetched; the status dropdown is applied by the table view.
        move || async move { gateway.list(entity, grouping.as_ref()).await }.boxed()
    }

    fn report_failure(&self, entry: &CacheEntry) {
        if let (FetchStatus::Error, Some(err)) = (entry.status, entry.error.as_deref()) {
            let message = if err.is_auth() {
                format!("{err}. Set a token with --token and reload.")
            } else {
                format!("{err}. Press r to try again.")
            };
            self.notify(Notice::error("Failed to load data", message));
        }
    }

    /// Current listing for the bound key, fetched only on a miss or after invalidation.
    pub async fn load(&self) -> CacheEntry {
        let key = self.current_key();
        let entry = self.cache.read(&key, self.list_fetch()).await;
        self.report_failure(&entry);
        self.emit(ConsoleEvent::CollectionChanged);
        entry
    }

    /// Explicit "try again".
    pub async fn reload(&self) -> CacheEntry {
        self.cache
            .invalidate(&CachePrefix::collection(self.entity.detail_collection()));
        let key = self.current_key();
        let entry = self.cache.refetch(&key, self.list_fetch()).await;
        self.report_failure(&entry);
        self.emit(ConsoleEvent::CollectionChanged);
        entry
    }

    /// Pure re-render: the cached entry, no network.
    pub fn snapshot(&self) -> CacheEntry {
        self.cache.peek(&self.current_key())
    }

    pub async fn select_grouping(&self, grouping: GroupingKey) -> CacheEntry {
        lock(&self.scope).grouping = Some(grouping);
        self.load().await
    }

    pub async fn select_status(&self, status: StatusFilter) -> CacheEntry {
        lock(&self.scope).status = status;
        self.load().await
    }

    /// Available groupings (events). Entities without groupings return an empty list.
    pub async fn groupings(&self) -> Result<Vec<GroupingKey>, GatewayError> {
        if !self.entity.supports_groupings() {
            return Ok(Vec::new());
        }
        match self.gateway.groupings(self.entity).await {
            Ok(list) => {
                self.emit(ConsoleEvent::GroupingsLoaded(list.clone()));
                Ok(list)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load groupings");
                self.notify(Notice::error("Failed to load events", e.to_string()));
                Err(e)
            }
        }
    }

    fn find(&self, id: &RecordId) -> Result<Record, ActionError> {
        self.snapshot()
            .data
            .iter()
            .find(|r| r.id().as_ref() == Some(id))
            .cloned()
            .ok_or_else(|| ActionError::UnknownRecord(id.clone()))
    }

    fn ensure_writable(&self) -> Result<(), ActionError> {
        if self.is_restricted() {
            self.notify(Notice::error("Not permitted", "Your account is read-only."));
            return Err(ActionError::Restricted);
        }
        Ok(())
    }

    /// Move the record to its next status. A second advance of the same record while the
    /// first is still in flight is rejected.
    pub async fn advance(&self, id: &RecordId) -> Result<ParticipantStatus, ActionError> {
        self.ensure_writable()?;
        let record = self.find(id)?;
        if !lock(&self.advancing).insert(id.clone()) {
            return Err(ActionError::ActionRejected(format!(
                "status change for {id} already in progress"
            )));
        }
        let result = self.workflow.advance(self.entity, &record).await;
        lock(&self.advancing).remove(id);
        self.emit(ConsoleEvent::AdvanceFinished { id: id.clone() });
        let next = result?;
        self.load().await;
        Ok(next)
    }

    pub fn is_advancing(&self, id: &RecordId) -> bool {
        lock(&self.advancing).contains(id)
    }

    /// Delete after confirmation. Returns whether anything was deleted.
    pub async fn delete(&self, id: &RecordId, confirm: Confirmation) -> Result<bool, ActionError> {
        if confirm == Confirmation::Declined {
            return Ok(false);
        }
        self.ensure_writable()?;
        if !self.entity.supports_delete() {
            return Err(ActionError::Unsupported {
                entity: self.entity,
                operation: "delete",
            });
        }
        match self.gateway.delete(self.entity, id).await {
            Ok(()) => {
                tracing::info!(%id, "record deleted");
                self.cache
                    .invalidate(&CachePrefix::collection(self.entity.collection()));
                if lock(&self.selected).as_ref() == Some(id) {
                    self.close_detail();
                }
                self.notify(Notice::success("Deleted", format!("Record {id} deleted")));
                self.load().await;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "delete failed");
                self.notify(Notice::error(
                    "Error",
                    "Failed to delete record. Please try again.",
                ));
                Err(e.into())
            }
        }
    }

    fn detail_key(&self, id: &RecordId) -> CacheKey {
        CacheKey::new(
            self.entity.detail_collection(),
            Some(GroupingKey(id.0.clone())),
            StatusFilter::All,
        )
    }

    /// Show one record in the side panel, replacing any open one.
    pub async fn open_detail(&self, id: &RecordId) -> Result<Record, Arc<GatewayError>> {
        *lock(&self.selected) = Some(id.clone());
        let gateway = self.gateway.clone();
        let entity = self.entity;
        let fetch_id = id.clone();
        let fetch = move || {
            async move { gateway.detail(entity, &fetch_id).await.map(|r| vec![r]) }.boxed()
        };
        let key = self.detail_key(id);
        // Reopening a failed detail is the retry.
        let entry = if self.cache.peek(&key).status == FetchStatus::Error {
            self.cache.refetch(&key, fetch).await
        } else {
            self.cache.read(&key, fetch).await
        };

        let result = match (entry.error, entry.data.first()) {
            (Some(e), _) => Err(e),
            (None, Some(r)) => Ok(r.clone()),
            (None, None) => Err(Arc::new(GatewayError::Decode(format!(
                "no detail for {id}"
            )))),
        };
        // A later open replaced this one while it was loading.
        if self.selected().as_ref() == Some(id) {
            self.emit(ConsoleEvent::DetailLoaded {
                id: id.clone(),
                detail: result
                    .as_ref()
                    .map(|r| Box::new(r.clone()))
                    .map_err(|e| e.to_string()),
            });
        }
        result
    }

    pub fn close_detail(&self) {
        *lock(&self.selected) = None;
    }

    pub fn selected(&self) -> Option<RecordId> {
        lock(&self.selected).clone()
    }

    fn bulk(&self) -> Result<&BulkPrinter, ActionError> {
        self.printer.as_ref().ok_or(ActionError::Unsupported {
            entity: self.entity,
            operation: "printing",
        })
    }

    /// Ids in the current listing that have not been printed yet.
    pub fn unprinted(&self) -> Vec<RecordId> {
        print::unprinted(self.entity, &self.snapshot().data)
    }

    /// Print every unprinted row of the current listing, one after another.
    pub async fn print_unprinted(&self) -> Result<BulkPrintRun, ActionError> {
        let bulk = self.bulk()?;
        let mut entry = self.snapshot();
        if entry.status != FetchStatus::Success {
            entry = self.load().await;
        }
        let run = bulk.print_unprinted(&entry.data, &self.events).await;
        self.after_print(run).await;
        Ok(run)
    }

    pub async fn print_one(&self, id: &RecordId) -> Result<BulkPrintRun, ActionError> {
        let bulk = self.bulk()?;
        let run = bulk.print_one(id.clone(), &self.events).await;
        self.after_print(run).await;
        Ok(run)
    }

    async fn after_print(&self, run: BulkPrintRun) {
        match run {
            BulkPrintRun::AlreadyRunning => {
                self.notify(Notice::info("Printing", "A print run is already in progress."));
            }
            BulkPrintRun::Finished {
                printed,
                failed,
                skipped,
            } => {
                self.cache
                    .invalidate(&CachePrefix::collection(self.entity.collection()));
                self.cache
                    .invalidate(&CachePrefix::collection(self.entity.detail_collection()));
                let message = format!("{printed} printed, {failed} failed, {skipped} skipped");
                if failed > 0 {
                    self.notify(Notice::error("Print finished with errors", message));
                } else {
                    self.notify(Notice::success("Print finished", message));
                }
                self.load().await;
            }
        }
    }

    /// Resolve a panel route. Edit and create are closed to restricted users.
    pub fn navigate(&self, route: Route) -> Result<String, ActionError> {
        if matches!(route, Route::Edit(_) | Route::Create) {
            self.ensure_writable()?;
        }
        let path = self.entity.route(&route);
        tracing::debug!(%path, "navigate");
        self.notify(Notice::info("Open in panel", path.clone()));
        Ok(path)
    }
}

#[cfg(test)]
#[path = "../tests/list_tests.rs"]
mod tests;
