use std::collections::HashMap;

/// An HTTP response, either produced by an upstream or synthesized by
/// the dispatcher (e.g. for `BOTH_UPSTREAMS_FAILED`). Immutable once
/// constructed.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    content_type: Option<String>,
}

impl Response {
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone());
        Self {
            status,
            headers,
            body,
            content_type,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Best-effort JSON decode of the body, used by the comparator.
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_server_error_is_true_for_5xx_only() {
        let ok = Response::new(200, HashMap::new(), vec![]);
        let err = Response::new(502, HashMap::new(), vec![]);
        assert!(!ok.is_server_error());
        assert!(err.is_server_error());
    }

    #[test]
    fn content_type_is_extracted_case_insensitively() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let resp = Response::new(200, headers, vec![]);
        assert_eq!(resp.content_type(), Some("application/json"));
    }
}
