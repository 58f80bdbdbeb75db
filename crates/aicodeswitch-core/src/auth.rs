//! Client bearer-token check against `AppConfig.apiKey`. An empty
//! configured key disables client auth entirely.

use http::HeaderMap;

use crate::error::ProxyError;

pub fn check_bearer(headers: &HeaderMap, configured_key: &str) -> Result<(), ProxyError> {
    if configured_key.is_empty() {
        return Ok(());
    }
    let expected = format!("Bearer {configured_key}");
    let provided = headers.get(http::header::AUTHORIZATION).and_then(|value| value.to_str().ok());
    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(ProxyError::InvalidApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_configured_key_disables_auth() {
        let headers = HeaderMap::new();
        assert!(check_bearer(&headers, "").is_ok());
    }

    #[test]
    fn mismatched_bearer_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(check_bearer(&headers, "right").is_err());
    }

    #[test]
    fn matching_bearer_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer right".parse().unwrap());
        assert!(check_bearer(&headers, "right").is_ok());
    }
}
