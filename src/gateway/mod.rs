//! Remote data gateway: the only code that talks to the panel API.

mod http;

pub use http::HttpGateway;

use crate::entity::EntityKind;
use crate::model::{GroupingKey, Record, RecordId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not signed in: no bearer token in session")]
    MissingCredential,
    #[error("credential rejected by server (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("server returned HTTP {status}")]
    Status { status: u16 },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{entity:?} has no {operation} endpoint")]
    Unsupported {
        entity: EntityKind,
        operation: &'static str,
    },
}

impl GatewayError {
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingCredential | GatewayError::Unauthorized { .. }
        )
    }
}

/// Authenticated access to entity collections. Implementations never retry.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    async fn list(
        &self,
        entity: EntityKind,
        grouping: Option<&GroupingKey>,
    ) -> Result<Vec<Record>, GatewayError>;

    /// Full-fidelity record, as opposed to the summary row in listings.
    async fn detail(&self, entity: EntityKind, id: &RecordId) -> Result<Record, GatewayError>;

    /// Returns the updated record when the server echoes one back.
    async fn update_status(
        &self,
        entity: EntityKind,
        id: &RecordId,
        status: &str,
    ) -> Result<Option<Record>, GatewayError>;

    async fn delete(&self, entity: EntityKind, id: &RecordId) -> Result<(), GatewayError>;

    async fn groupings(&self, entity: EntityKind) -> Result<Vec<GroupingKey>, GatewayError>;
}
