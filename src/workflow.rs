//! Participant status workflow: one advance is one status write, then a cache invalidation.

use crate::cache::{CachePrefix, QueryCache};
use crate::entity::EntityKind;
use crate::gateway::{GatewayError, RecordGateway};
use crate::model::{ConsoleEvent, Notice, Record};
use crate::status::ParticipantStatus;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0:?} records have no status workflow")]
    NoWorkflow(EntityKind),
    #[error("record has no id")]
    MissingId,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct StatusWorkflow {
    gateway: Arc<dyn RecordGateway>,
    cache: Arc<QueryCache>,
    events: mpsc::UnboundedSender<ConsoleEvent>,
}

impl StatusWorkflow {
    pub fn new(
        gateway: Arc<dyn RecordGateway>,
        cache: Arc<QueryCache>,
        events: mpsc::UnboundedSender<ConsoleEvent>,
    ) -> Self {
        Self {
            gateway,
            cache,
            events,
        }
    }

    /// Status the record moves to on its next advance.
    pub fn next_status(entity: EntityKind, record: &Record) -> Result<ParticipantStatus, WorkflowError> {
        let field = entity
            .status_field()
            .ok_or(WorkflowError::NoWorkflow(entity))?;
        // Anything outside the cycle moves to its first state.
        Ok(record
            .get_str(field)
            .and_then(ParticipantStatus::parse)
            .map_or(ParticipantStatus::CYCLE[0], ParticipantStatus::next))
    }

    /// Write the successor status. On success every listing of the collection is invalidated;
    /// on failure nothing changes locally and the write is not retried.
    pub async fn advance(
        &self,
        entity: EntityKind,
        record: &Record,
    ) -> Result<ParticipantStatus, WorkflowError> {
        let next = Self::next_status(entity, record)?;
        let id = record.id().ok_or(WorkflowError::MissingId)?;

        match self.gateway.update_status(entity, &id, next.as_str()).await {
            Ok(_) => {
                self.cache
                    .invalidate(&CachePrefix::collection(entity.collection()));
                self.cache
                    .invalidate(&CachePrefix::collection(entity.detail_collection()));
                tracing::info!(%id, status = %next, "status advanced");
                self.notify(Notice::success(
                    "Status Updated",
                    format!("Participant status changed to {next}"),
                ));
                Ok(next)
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "status update failed");
                self.notify(Notice::error(
                    "Error",
                    "Failed to update status. Please try again.",
                ));
                Err(e.into())
            }
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(ConsoleEvent::Notice(notice));
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
