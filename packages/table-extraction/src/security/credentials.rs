//! API key handling for the vision backend.
//!
//! Keys live in a `secrecy::SecretBox` and only leave it on the way to the
//! HTTP client. Debug output and logs get a short hint instead.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_VAR: &str = "OPENAI_MODEL";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Keys shorter than this get no hint at all.
const MIN_HINTED_LEN: usize = 12;
const HINT_PREFIX: usize = 3;
const HINT_SUFFIX: usize = 4;

/// A provider API key.
///
/// Surrounding whitespace is dropped on construction, since keys pasted
/// into `.env` files often carry a trailing newline.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().trim())))
    }

    /// The raw key. Only the request path should call this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.expose().is_empty()
    }

    /// Masked form safe for logs, e.g. `sk-…a1b2`.
    pub fn hint(&self) -> String {
        let chars: Vec<char> = self.expose().chars().collect();
        if chars.len() < MIN_HINTED_LEN {
            return "****".to_string();
        }
        let head: String = chars[..HINT_PREFIX].iter().collect();
        let tail: String = chars[chars.len() - HINT_SUFFIX..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.hint())
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Where and how to call the vision model.
#[derive(Clone)]
pub struct VisionCredentials {
    pub api_key: ApiKey,
    pub model: String,

    /// Proxy or compatible gateway; `None` means the provider default
    pub base_url: Option<String>,
}

impl VisionCredentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            model: model.into(),
            base_url: None,
        }
    }

    /// Blank URLs are ignored; a trailing slash is dropped.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.trim().trim_end_matches('/');
        self.base_url = (!url.is_empty()).then(|| url.to_string());
        self
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    ///
    /// Returns `None` when no usable key is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`VisionCredentials::from_env`] over any variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = ApiKey::new(get(API_KEY_VAR)?);
        if api_key.is_blank() {
            return None;
        }

        let model = get(MODEL_VAR)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let credentials = Self {
            api_key,
            model,
            base_url: None,
        };
        Some(match get(BASE_URL_VAR) {
            Some(url) => credentials.with_base_url(url),
            None => credentials,
        })
    }
}

impl fmt::Debug for VisionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionCredentials")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "sk-proj-0123456789abcdef";

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_key_hidden_in_debug() {
        let key = ApiKey::new(KEY);
        let debug = format!("{:?}", key);
        assert_eq!(debug, "ApiKey(sk-…cdef)");
        assert!(!debug.contains("0123456789"));
        assert_eq!(key.expose(), KEY);
    }

    #[test]
    fn test_short_key_gets_no_hint() {
        assert_eq!(ApiKey::new("sk-abc").hint(), "****");
    }

    #[test]
    fn test_key_is_trimmed() {
        let key = ApiKey::from(format!("  {}\n", KEY));
        assert_eq!(key.expose(), KEY);
        assert_eq!(key.clone().expose(), KEY);
        assert!(ApiKey::new(" \n").is_blank());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let creds = VisionCredentials::from_lookup(vars(&[(API_KEY_VAR, KEY)])).unwrap();
        assert_eq!(creds.model, DEFAULT_MODEL);
        assert_eq!(creds.base_url, None);

        let creds = VisionCredentials::from_lookup(vars(&[
            (API_KEY_VAR, KEY),
            (MODEL_VAR, " gpt-4o-mini "),
            (BASE_URL_VAR, "https://gateway.local/v1/"),
        ]))
        .unwrap();
        assert_eq!(creds.model, "gpt-4o-mini");
        assert_eq!(creds.base_url.as_deref(), Some("https://gateway.local/v1"));
    }

    #[test]
    fn test_from_lookup_requires_key() {
        assert!(VisionCredentials::from_lookup(vars(&[])).is_none());
        assert!(VisionCredentials::from_lookup(vars(&[(API_KEY_VAR, "   ")])).is_none());
    }

    #[test]
    fn test_blank_values_fall_back() {
        let creds = VisionCredentials::from_lookup(vars(&[
            (API_KEY_VAR, KEY),
            (MODEL_VAR, ""),
            (BASE_URL_VAR, " "),
        ]))
        .unwrap();
        assert_eq!(creds.model, DEFAULT_MODEL);
        assert_eq!(creds.base_url, None);
    }

    #[test]
    fn test_credentials_debug_shows_hint_only() {
        let creds = VisionCredentials::new(KEY, "gpt-4o").with_base_url("https://gateway.local/v1");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains(KEY));
        assert!(debug.contains("sk-…cdef"));
        assert!(debug.contains("gateway.local"));
    }
}
