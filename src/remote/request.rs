//! Rendered remote request

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Request handler plus its parameters, in deterministic order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRequest {
    pub handler: String,
    pub params: BTreeMap<String, String>,
}

impl RemoteRequest {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl fmt::Display for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handler)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_sorted_params() {
        let request = RemoteRequest::new("/export")
            .with_param("q", "*:*")
            .with_param("fl", "a,b");
        assert_eq!(request.to_string(), "/export?fl=a,b&q=*:*");
    }

    #[test]
    fn test_serializes() {
        let request = RemoteRequest::new("/stream").with_param("expr", "stats(t)");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["handler"], "/stream");
        assert_eq!(json["params"]["expr"], "stats(t)");
    }
}
