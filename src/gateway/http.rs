use super::{GatewayError, RecordGateway};
use crate::entity::EntityKind;
use crate::model::{ConsoleConfig, GroupingKey, Record, RecordId};
use crate::session::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{Map, Value};
use url::Url;

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl HttpGateway {
    pub fn new(cfg: &ConsoleConfig, session: Session) -> Result<Self> {
        let base_url = Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid base url {}", cfg.base_url))?;
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        let token = self
            .session
            .credential()
            .ok_or(GatewayError::MissingCredential)?;
        let url = self
            .base_url
            .join(path)
            .map_err(|e| GatewayError::Decode(format!("bad path {path}: {e}")))?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, GatewayError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

fn records_from(body: &Value, envelope: &str) -> Result<Vec<Record>, GatewayError> {
    match body.get(envelope) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(Record(map.clone())),
                other => Err(GatewayError::Decode(format!(
                    "expected object in `{envelope}`, got {other}"
                ))),
            })
            .collect(),
        Some(other) => Err(GatewayError::Decode(format!(
            "expected array in `{envelope}`, got {other}"
        ))),
    }
}

fn record_from(body: &Value, envelope: &str) -> Result<Record, GatewayError> {
    match body.get(envelope) {
        Some(Value::Object(map)) => Ok(Record(map.clone())),
        _ => Err(GatewayError::Decode(format!("missing object `{envelope}`"))),
    }
}

#[async_trait]
impl RecordGateway for HttpGateway {
    async fn list(
        &self,
        entity: EntityKind,
        grouping: Option<&GroupingKey>,
    ) -> Result<Vec<Record>, GatewayError> {
        let path = entity.list_path(grouping);
        tracing::debug!(%path, "fetching collection");
        let body = self.send(self.request(Method::GET, &path)?).await?;
        records_from(&body, entity.envelope())
    }

    async fn detail(&self, entity: EntityKind, id: &RecordId) -> Result<Record, GatewayError> {
        let path = entity.detail_path(id);
        let body = self.send(self.request(Method::GET, &path)?).await?;
        record_from(&body, entity.envelope())
    }

    async fn update_status(
        &self,
        entity: EntityKind,
        id: &RecordId,
        status: &str,
    ) -> Result<Option<Record>, GatewayError> {
        let unsupported = GatewayError::Unsupported {
            entity,
            operation: "status",
        };
        let (Some(path), Some(field)) = (entity.status_path(id), entity.status_field()) else {
            return Err(unsupported);
        };
        let mut payload = Map::new();
        payload.insert(field.to_string(), Value::from(status));
        let req = self.request(Method::PUT, &path)?.json(&payload);
        let body = self.send(req).await?;
        Ok(record_from(&body, entity.envelope()).ok())
    }

    async fn delete(&self, entity: EntityKind, id: &RecordId) -> Result<(), GatewayError> {
        let path = entity.delete_path(id).ok_or(GatewayError::Unsupported {
            entity,
            operation: "delete",
        })?;
        self.send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn groupings(&self, entity: EntityKind) -> Result<Vec<GroupingKey>, GatewayError> {
        let path = entity.groupings_path().ok_or(GatewayError::Unsupported {
            entity,
            operation: "grouping",
        })?;
        let body = self.send(self.request(Method::GET, path)?).await?;
        let items = records_from(&body, "event")?;
        Ok(items
            .iter()
            .map(|r| r.text("event"))
            .filter(|e| !e.is_empty())
            .map(GroupingKey)
            .collect())
    }
}

#[cfg(test)]
#[path = "../tests/gateway_tests.rs"]
mod tests;
