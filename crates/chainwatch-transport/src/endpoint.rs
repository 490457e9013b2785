//! Endpoint addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One gateway in the failover list: a `host[:port]` and a scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default)]
    pub scheme: Scheme,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            scheme,
        }
    }

    /// `scheme://host` with no trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host.trim_end_matches('/'))
    }

    /// Join a request path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url())
        } else {
            format!("{}/{path}", self.base_url())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joining() {
        let endpoint = Endpoint::new("lcd.example.org/", Scheme::Https);
        assert_eq!(endpoint.base_url(), "https://lcd.example.org");
        assert_eq!(
            endpoint.url("/cosmos/base/tendermint/v1beta1/blocks/latest"),
            "https://lcd.example.org/cosmos/base/tendermint/v1beta1/blocks/latest"
        );
        assert_eq!(
            endpoint.url("status"),
            "https://lcd.example.org/status"
        );
    }

    #[test]
    fn scheme_defaults_to_https() {
        let endpoint: Endpoint = serde_json::from_str(r#"{"host":"a.b"}"#).unwrap();
        assert_eq!(endpoint.scheme, Scheme::Https);

        let endpoint: Endpoint =
            serde_json::from_str(r#"{"host":"127.0.0.1:1317","scheme":"http"}"#).unwrap();
        assert_eq!(endpoint.base_url(), "http://127.0.0.1:1317");
    }
}
