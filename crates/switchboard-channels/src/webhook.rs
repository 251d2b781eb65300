//! Webhook request context
//!
//! Wraps one inbound hook call: the body is buffered once and can then be
//! read raw, as JSON or as a URL-encoded form as often as needed.

use crate::error::{Error, Result};
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;

/// Form field some senders wrap their JSON in
const PAYLOAD_FIELD: &str = "payload";

/// Context of one webhook call
#[derive(Debug, Clone)]
pub struct WebhookContext {
    hook_id: String,
    request_id: Uuid,
    headers: HeaderMap,
    body: Bytes,
}

impl WebhookContext {
    /// Create a context from the parts of a buffered request
    pub fn new(hook_id: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            hook_id: hook_id.into(),
            request_id: Uuid::new_v4(),
            headers,
            body,
        }
    }

    /// Hook id from the URL
    pub fn hook_id(&self) -> &str {
        &self.hook_id
    }

    /// Unique id generated for this call
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Request body
    pub fn raw(&self) -> &[u8] {
        &self.body
    }

    /// Header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the body as JSON
    ///
    /// A body of the form `payload=<url-encoded JSON>` is decoded from the
    /// `payload` field instead.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match serde_json::from_slice(&self.body) {
            Ok(value) => Ok(value),
            Err(e) if self.body.starts_with(b"payload=") => {
                let payload = self
                    .form_value(PAYLOAD_FIELD)
                    .ok_or_else(|| Error::Payload(e.to_string()))?;
                serde_json::from_str(&payload).map_err(|e| Error::Payload(e.to_string()))
            }
            Err(e) => Err(Error::Payload(e.to_string())),
        }
    }

    /// Body decoded as a URL-encoded form; repeated keys keep the first value
    pub fn form(&self) -> HashMap<String, String> {
        let mut values = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(&self.body) {
            values
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        values
    }

    /// Single form value
    pub fn form_value(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}
