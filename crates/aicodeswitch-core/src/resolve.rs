//! Rule resolution over an immutable [`RoutingSnapshot`], and the snapshot
//! itself: the Proxy Engine's in-memory derived state, atomically swapped
//! on reload so in-flight requests keep the snapshot they started with.

use std::collections::HashMap;

use aicodeswitch_storage::{ApiService, ContentType, Route, Rule, TargetType};

use crate::error::ProxyError;

/// `activeRoutes` indexed by `targetType`, `rulesByRouteId` each ordered
/// by `contentType`, `servicesById` — rebuilt wholesale on every reload.
#[derive(Debug, Default)]
pub struct RoutingSnapshot {
    active_routes: HashMap<TargetType, Route>,
    rules_by_route_id: HashMap<String, Vec<Rule>>,
    services_by_id: HashMap<String, ApiService>,
}

impl RoutingSnapshot {
    pub fn build(routes: Vec<Route>, rules: Vec<Rule>, services: Vec<ApiService>) -> Self {
        let mut active_routes = HashMap::new();
        for route in routes {
            if route.is_active {
                active_routes.insert(route.target_type, route);
            }
        }

        let mut rules_by_route_id: HashMap<String, Vec<Rule>> = HashMap::new();
        for rule in rules {
            rules_by_route_id.entry(rule.route_id.clone()).or_default().push(rule);
        }

        let services_by_id = services.into_iter().map(|service| (service.id.clone(), service)).collect();

        Self { active_routes, rules_by_route_id, services_by_id }
    }

    pub fn active_route(&self, target_type: TargetType) -> Option<&Route> {
        self.active_routes.get(&target_type)
    }

    pub fn service(&self, id: &str) -> Option<&ApiService> {
        self.services_by_id.get(id)
    }
}

pub struct Resolution<'a> {
    pub route: &'a Route,
    pub rule: &'a Rule,
    pub service: &'a ApiService,
}

/// Picks the active route for `target_type`, then the rule matching
/// `content_type` within it, falling back to that route's `default` rule.
pub fn resolve<'a>(
    snapshot: &'a RoutingSnapshot,
    target_type: TargetType,
    content_type: ContentType,
) -> Result<Resolution<'a>, ProxyError> {
    let route = snapshot.active_route(target_type).ok_or(ProxyError::NoMatchingRoute)?;
    let rules = snapshot.rules_by_route_id.get(&route.id).map(Vec::as_slice).unwrap_or(&[]);

    let rule = rules
        .iter()
        .find(|rule| rule.content_type == content_type)
        .or_else(|| rules.iter().find(|rule| rule.content_type == ContentType::Default))
        .ok_or(ProxyError::NoMatchingRule)?;

    let service = snapshot.service(&rule.target_service_id).ok_or(ProxyError::TargetServiceMissing)?;

    Ok(Resolution { route, rule, service })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: &str) -> ApiService {
        ApiService {
            id: id.to_string(),
            vendor_id: "v1".to_string(),
            name: id.to_string(),
            api_url: "https://example.test".to_string(),
            api_key: "secret".to_string(),
            timeout_ms: 30_000,
            source_type: aicodeswitch_storage::SourceType::ClaudeChat,
            supported_models: Vec::new(),
        }
    }

    fn rule(route_id: &str, content_type: ContentType, service_id: &str) -> Rule {
        Rule {
            id: format!("{route_id}-{content_type:?}"),
            route_id: route_id.to_string(),
            content_type,
            target_service_id: service_id.to_string(),
            target_model: None,
        }
    }

    #[test]
    fn falls_back_to_default_rule_when_content_type_has_none() {
        let routes = vec![Route { id: "r1".to_string(), name: "r".to_string(), target_type: TargetType::ClaudeCode, is_active: true }];
        let rules = vec![rule("r1", ContentType::Default, "svc-default")];
        let services = vec![service("svc-default")];
        let snapshot = RoutingSnapshot::build(routes, rules, services);

        let resolution = resolve(&snapshot, TargetType::ClaudeCode, ContentType::Thinking).unwrap();
        assert_eq!(resolution.service.id, "svc-default");
    }

    #[test]
    fn no_active_route_is_reported() {
        let snapshot = RoutingSnapshot::build(Vec::new(), Vec::new(), Vec::new());
        let err = resolve(&snapshot, TargetType::Codex, ContentType::Default).unwrap_err();
        assert!(matches!(err, ProxyError::NoMatchingRoute));
    }
}
