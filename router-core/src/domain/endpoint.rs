use std::time::Duration;

/// A remote HTTP service the dispatcher can forward to.
///
/// Endpoints are loaded from configuration at startup (preferred) or
/// from [`crate::repository::EndpointRepository`]. The invariant that at
/// most one endpoint per side (`is_legacy`) is `is_default = true` is
/// enforced by the repository/config loader, not by this type; `select`
/// below implements the fallback cascade `spec.md` §3 describes when
/// that invariant still leaves ambiguity or when the preferred endpoint
/// is inactive.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub endpoint_id: String,
    pub base_url: String,
    pub health_probe_path: Option<String>,
    pub is_active: bool,
    pub timeout: Duration,
    /// Bounded: validated by the config loader / repository, not here.
    pub retry_count: u32,
    pub is_legacy: bool,
    pub is_default: bool,
}

impl Endpoint {
    /// Applies the fallback cascade from `spec.md` §3:
    /// `(default+legacy+active) -> (legacy+active) -> (any active)`,
    /// where "legacy" here means "matching the requested side".
    pub fn select(endpoints: &[Endpoint], is_legacy: bool) -> Option<&Endpoint> {
        endpoints
            .iter()
            .find(|e| e.is_default && e.is_legacy == is_legacy && e.is_active)
            .or_else(|| endpoints.iter().find(|e| e.is_legacy == is_legacy && e.is_active))
            .or_else(|| endpoints.iter().find(|e| e.is_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str, legacy: bool, default: bool, active: bool) -> Endpoint {
        Endpoint {
            endpoint_id: id.to_string(),
            base_url: "http://example".to_string(),
            health_probe_path: None,
            is_active: active,
            timeout: Duration::from_secs(1),
            retry_count: 0,
            is_legacy: legacy,
            is_default: default,
        }
    }

    #[test]
    fn prefers_default_legacy_active() {
        let endpoints = vec![
            endpoint("a", true, false, true),
            endpoint("b", true, true, true),
        ];
        let selected = Endpoint::select(&endpoints, true).unwrap();
        assert_eq!(selected.endpoint_id, "b");
    }

    #[test]
    fn falls_back_to_any_active_legacy_when_no_default() {
        let endpoints = vec![endpoint("a", true, false, true)];
        let selected = Endpoint::select(&endpoints, true).unwrap();
        assert_eq!(selected.endpoint_id, "a");
    }

    #[test]
    fn falls_back_to_any_active_endpoint() {
        let endpoints = vec![endpoint("a", false, false, true)];
        let selected = Endpoint::select(&endpoints, true).unwrap();
        assert_eq!(selected.endpoint_id, "a");
    }

    #[test]
    fn none_when_nothing_active() {
        let endpoints = vec![endpoint("a", true, true, false)];
        assert!(Endpoint::select(&endpoints, true).is_none());
    }
}
