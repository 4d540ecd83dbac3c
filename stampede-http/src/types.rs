//! Request methods

use crate::errors::HttpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Method of a scenario request; `GET` when a catalog omits it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HttpError::InvalidMethod(s.to_string()))
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_ignores_case() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!(reqwest::Method::from(HttpMethod::Delete), reqwest::Method::DELETE);
        assert_eq!(format!("{:<6}|", HttpMethod::Post), "POST  |");
    }

    #[test]
    fn test_unsupported_method() {
        let err = "TRACE".parse::<HttpMethod>().unwrap_err();
        assert!(matches!(err, HttpError::InvalidMethod(ref m) if m == "TRACE"));
    }

    #[test]
    fn test_method_deserializes_uppercase() {
        let method: HttpMethod = serde_json::from_str("\"POST\"").unwrap();
        assert_eq!(method, HttpMethod::Post);
        assert!(serde_json::from_str::<HttpMethod>("\"post\"").is_err());
    }
}
