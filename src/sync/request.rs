use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A single logical request against the remote API.
///
/// Descriptors are built by page sources, one per pagination step, and are
/// handed to the worker pool by value. Once enqueued nothing mutates them.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    cancel: CancellationToken,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Replaces the cancellation token the fetch client observes.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Looks up the first query value stored under `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Result of executing one request descriptor.
///
/// Exactly one variant holds. `TransientError` carries `None` when the
/// transport failed before any HTTP status was received.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    RateLimited { retry_after_secs: Option<u64> },
    TransientError { status: Option<u16> },
    FatalError { status: u16, message: String },
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// One page of a cursor-paginated collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Raw entity records in the order the API returned them.
    pub items: Vec<Value>,
    /// Continuation token, `None` or empty once the collection is exhausted.
    pub next_cursor: Option<String>,
    /// Size of the whole collection when the API reports it.
    pub total: Option<u64>,
}

impl Page {
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor().is_none()
    }
}
