use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    AccessLog, AccessLogId, AccessLogPatch, AppConfig, ApiService, ErrorLog, RequestLog, Route,
    Rule, Vendor,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// The read interface the proxy engine consumes. Persistence, admin CRUD
/// and authentication of writes to this data are external collaborators —
/// this crate only defines the contract and an in-memory reference
/// implementation (see [`crate::memory`]).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list_active_routes(&self) -> Result<Vec<Route>, StoreError>;
    async fn list_rules(&self, route_id: &str) -> Result<Vec<Rule>, StoreError>;
    async fn list_services(&self) -> Result<Vec<ApiService>, StoreError>;
    async fn get_vendors(&self) -> Result<Vec<Vendor>, StoreError>;
    async fn get_config(&self) -> Result<AppConfig, StoreError>;
}

/// The write interface the proxy engine's log recorder emits through.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append_request_log(&self, record: RequestLog) -> Result<(), StoreError>;
    async fn append_access_log(&self, record: AccessLog) -> Result<AccessLogId, StoreError>;
    async fn update_access_log(
        &self,
        id: AccessLogId,
        patch: AccessLogPatch,
    ) -> Result<(), StoreError>;
    async fn append_error_log(&self, record: ErrorLog) -> Result<(), StoreError>;
}
