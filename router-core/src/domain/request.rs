use std::collections::HashMap;

/// A captured inbound call.
///
/// `Request` is built once by the HTTP adapter at the edge of the core
/// (see `spec.md` §6 — "the surrounding HTTP adapter is responsible for
/// parsing method, path, headers, query parameters and body bytes") and
/// is immutable for the remainder of the dispatch. Only the first value
/// of a repeated header or query parameter is retained, matching the
/// boundary contract.
#[derive(Debug, Clone)]
pub struct Request {
    /// Eight hex characters, unique per dispatch.
    request_id: String,
    method: String,
    /// Full URL path, not a pattern parameter.
    path: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

impl Request {
    /// Builds a new `Request`, generating a fresh `request_id`.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            request_id: generate_request_id(),
            method: method.into(),
            path: path.into(),
            headers,
            query,
            body,
        }
    }

    /// Builds a `Request` with a caller-supplied `request_id`, for tests
    /// and for adapters that already minted one upstream.
    pub fn with_id(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            headers,
            query,
            body,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Cache key used by the router and rule cache: `method:path`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

fn generate_request_id() -> String {
    let raw = uuid::Uuid::new_v4();
    raw.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_request_id_is_eight_hex_chars() {
        let req = Request::new("GET", "/a", HashMap::new(), HashMap::new(), vec![]);
        assert_eq!(req.request_id().len(), 8);
        assert!(req.request_id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_key_combines_method_and_path() {
        let req = Request::new("GET", "/api/users/1", HashMap::new(), HashMap::new(), vec![]);
        assert_eq!(req.cache_key(), "GET:/api/users/1");
    }
}
