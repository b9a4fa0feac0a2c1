//! Thin serde wrappers over [`http::HeaderName`]/[`http::HeaderValue`] so header maps can be
//! deserialized directly from the configuration file.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderName(http::HeaderName);

impl HeaderName {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<'de> Deserialize<'de> for HeaderName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        http::HeaderName::try_from(raw.as_str())
            .map(HeaderName)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone)]
pub struct HeaderValue(http::HeaderValue);

impl HeaderValue {
    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for HeaderValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        http::HeaderValue::try_from(raw.as_str())
            .map(HeaderValue)
            .map_err(serde::de::Error::custom)
    }
}
