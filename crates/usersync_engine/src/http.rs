//! HTTP client abstraction.
//!
//! The engine never talks to the network directly. Every request goes through
//! an [`HttpClient`], so deliveries can be routed through reqwest in
//! production, straight into an in-process server in tests
//! ([`LoopbackClient`]), or into a recording fake.

use std::sync::Arc;
use std::time::Duration;

/// HTTP methods used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET (health checks).
    Get,
    /// POST (change delivery).
    Post,
    /// HEAD (URL-shape probe).
    Head,
}

impl HttpMethod {
    /// Method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body (empty for GET and HEAD).
    pub body: Vec<u8>,
    /// Total request timeout.
    pub timeout: Duration,
    /// Whether redirects are followed.
    pub follow_redirects: bool,
}

impl HttpRequest {
    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout: Duration::from_secs(30),
            follow_redirects: true,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let mut request = Self::new(HttpMethod::Post, url);
        request.body = body.into();
        request
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Looks up a header value (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The path component of the URL, without query string.
    pub fn path(&self) -> &str {
        let rest = self
            .url
            .find("://")
            .map(|i| &self.url[i + 3..])
            .unwrap_or(&self.url);
        let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("/");
        path.split('?').next().unwrap_or(path)
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body as JSON, or `None` if it does not parse.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// HTTP client abstraction.
///
/// `Err` means no response was received (connection refused, timeout, TLS
/// failure); any status code, including 4xx and 5xx, is an `Ok`.
pub trait HttpClient: Send + Sync {
    /// Executes a request.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        (**self).execute(request)
    }
}

/// Blocking reqwest-backed client.
pub struct ReqwestClient {
    following: reqwest::blocking::Client,
    direct: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds the client.
    pub fn new() -> Result<Self, String> {
        let user_agent = format!("UserSync/{}", usersync_core::VERSION);
        let following = reqwest::blocking::Client::builder()
            .user_agent(user_agent.clone())
            .build()
            .map_err(|e| format!("http client: {e}"))?;
        let direct = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| format!("http client: {e}"))?;
        Ok(Self { following, direct })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request addressed to `request.path()`.
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// The wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        Ok(self.server.handle(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl LoopbackServer for Echo {
        fn handle(&self, request: &HttpRequest) -> HttpResponse {
            HttpResponse::new(200, request.path().as_bytes().to_vec())
        }
    }

    #[test]
    fn request_builder() {
        let request = HttpRequest::post("https://a.example/x", b"{}".to_vec())
            .header("X-API-Key", "k")
            .timeout(Duration::from_secs(5))
            .no_redirects();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.header_value("x-api-key"), Some("k"));
        assert_eq!(request.timeout, Duration::from_secs(5));
        assert!(!request.follow_redirects);
    }

    #[test]
    fn path_extraction() {
        assert_eq!(
            HttpRequest::get("https://a.example/wp-json/sync/v1/health").path(),
            "/wp-json/sync/v1/health"
        );
        assert_eq!(HttpRequest::get("https://a.example").path(), "/");
        assert_eq!(HttpRequest::get("http://h:8080/p?q=1").path(), "/p");
    }

    #[test]
    fn response_helpers() {
        let response = HttpResponse::new(201, br#"{"ok":true}"#.to_vec());
        assert!(response.is_success());
        assert_eq!(response.json().unwrap()["ok"], true);
        assert!(!HttpResponse::new(404, Vec::new()).is_success());
        assert!(HttpResponse::new(500, b"oops".to_vec()).json().is_none());
    }

    #[test]
    fn loopback_routes_to_server() {
        let client = LoopbackClient::new(Echo);
        let response = client
            .execute(HttpRequest::head("http://peer.test/wp-json/"))
            .unwrap();
        assert_eq!(response.text(), "/wp-json/");
    }
}
