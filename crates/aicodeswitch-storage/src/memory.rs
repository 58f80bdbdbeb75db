//! In-memory reference implementation of [`ConfigStore`] and [`LogSink`].
//!
//! Real deployments are expected to back these traits with whatever
//! persistence layer owns the admin CRUD surface (out of scope for this
//! crate, per the proxy spec); this implementation exists so the workspace
//! builds and tests standalone, and so a bare binary has something to run
//! against out of the box.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::{
    AccessLog, AccessLogId, AccessLogPatch, AppConfig, ApiService, ErrorLog, RequestLog, Route,
    Rule, Vendor,
};
use crate::store::{ConfigStore, LogSink, StoreError};

#[derive(Debug, Default)]
struct ConfigData {
    vendors: Vec<Vendor>,
    services: Vec<ApiService>,
    routes: Vec<Route>,
    rules: Vec<Rule>,
    app_config: AppConfig,
}

/// A `RwLock`-guarded snapshot of configuration entities, mutated directly
/// by tests/embedders and read by the proxy engine through [`ConfigStore`].
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    data: RwLock<ConfigData>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_config(self, config: AppConfig) -> Self {
        self.data.write().unwrap().app_config = config;
        self
    }

    pub fn add_vendor(&self, vendor: Vendor) {
        self.data.write().unwrap().vendors.push(vendor);
    }

    pub fn add_service(&self, service: ApiService) {
        self.data.write().unwrap().services.push(service);
    }

    /// Adds `route`, deactivating any existing route of the same
    /// `target_type` first (the activation-uniqueness invariant).
    pub fn add_route(&self, route: Route) {
        let mut data = self.data.write().unwrap();
        if route.is_active {
            for existing in data.routes.iter_mut() {
                if existing.target_type == route.target_type {
                    existing.is_active = false;
                }
            }
        }
        data.routes.push(route);
    }

    pub fn add_rule(&self, rule: Rule) {
        self.data.write().unwrap().rules.push(rule);
    }

    pub fn activate_route(&self, route_id: &str) {
        let mut data = self.data.write().unwrap();
        let target_type = data
            .routes
            .iter()
            .find(|route| route.id == route_id)
            .map(|route| route.target_type);
        let Some(target_type) = target_type else {
            return;
        };
        for route in data.routes.iter_mut() {
            if route.target_type == target_type {
                route.is_active = route.id == route_id;
            }
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn list_active_routes(&self) -> Result<Vec<Route>, StoreError> {
        Ok(self
            .data
            .read()
            .unwrap()
            .routes
            .iter()
            .filter(|route| route.is_active)
            .cloned()
            .collect())
    }

    async fn list_rules(&self, route_id: &str) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .data
            .read()
            .unwrap()
            .rules
            .iter()
            .filter(|rule| rule.route_id == route_id)
            .cloned()
            .collect())
    }

    async fn list_services(&self) -> Result<Vec<ApiService>, StoreError> {
        Ok(self.data.read().unwrap().services.clone())
    }

    async fn get_vendors(&self) -> Result<Vec<Vendor>, StoreError> {
        Ok(self.data.read().unwrap().vendors.clone())
    }

    async fn get_config(&self) -> Result<AppConfig, StoreError> {
        Ok(self.data.read().unwrap().app_config.clone())
    }
}

/// Captures everything written through [`LogSink`] in memory, for tests
/// and small single-process deployments.
#[derive(Default)]
pub struct InMemoryLogSink {
    request_logs: Mutex<Vec<RequestLog>>,
    access_logs: Mutex<HashMap<AccessLogId, AccessLog>>,
    error_logs: Mutex<Vec<ErrorLog>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn request_logs(&self) -> Vec<RequestLog> {
        self.request_logs.lock().await.clone()
    }

    pub async fn access_logs(&self) -> Vec<AccessLog> {
        self.access_logs.lock().await.values().cloned().collect()
    }

    pub async fn error_logs(&self) -> Vec<ErrorLog> {
        self.error_logs.lock().await.clone()
    }
}

#[async_trait]
impl LogSink for InMemoryLogSink {
    async fn append_request_log(&self, record: RequestLog) -> Result<(), StoreError> {
        self.request_logs.lock().await.push(record);
        Ok(())
    }

    async fn append_access_log(&self, record: AccessLog) -> Result<AccessLogId, StoreError> {
        let id = record.id;
        self.access_logs.lock().await.insert(id, record);
        Ok(id)
    }

    async fn update_access_log(
        &self,
        id: AccessLogId,
        patch: AccessLogPatch,
    ) -> Result<(), StoreError> {
        let mut logs = self.access_logs.lock().await;
        let record = logs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(status) = patch.status_code {
            record.status_code = Some(status);
        }
        if let Some(elapsed) = patch.response_time_ms {
            record.response_time_ms = Some(elapsed);
        }
        if let Some(error) = patch.error {
            record.error = Some(error);
        }
        Ok(())
    }

    async fn append_error_log(&self, record: ErrorLog) -> Result<(), StoreError> {
        self.error_logs.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetType;

    #[tokio::test]
    async fn activating_a_route_deactivates_siblings_of_the_same_target_type() {
        let store = InMemoryConfigStore::new();
        store.add_route(Route {
            id: "r1".into(),
            name: "first".into(),
            target_type: TargetType::ClaudeCode,
            is_active: true,
        });
        store.add_route(Route {
            id: "r2".into(),
            name: "second".into(),
            target_type: TargetType::ClaudeCode,
            is_active: false,
        });
        store.activate_route("r2");
        let active = store.list_active_routes().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "r2");
    }

    #[tokio::test]
    async fn access_log_round_trip_updates_in_place() {
        let sink = InMemoryLogSink::new();
        let id = sink
            .append_access_log(AccessLog {
                id: uuid::Uuid::new_v4(),
                started_at: time::OffsetDateTime::now_utc(),
                method: "POST".into(),
                path: "/claude-code/v1/messages".into(),
                status_code: None,
                response_time_ms: None,
                error: None,
            })
            .await
            .unwrap();
        sink.update_access_log(
            id,
            AccessLogPatch {
                status_code: Some(200),
                response_time_ms: Some(12),
                error: None,
            },
        )
        .await
        .unwrap();
        let logs = sink.access_logs().await;
        assert_eq!(logs[0].status_code, Some(200));
    }
}
