//! HTTP client setup for a Metagame instance.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use url::Url;

use crate::config::{self, CREATE_EVENTS_ENDPOINT, GET_EVENTS_ENDPOINT};
use crate::error::{Error, Result};

/// Connection settings for one Metagame instance
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://meta-game.io`
    pub domain: String,

    /// Bearer token sent with every request
    pub token: String,

    /// Verify TLS certificates. Disable for local development.
    pub verify_ssl: bool,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            token: token.into(),
            verify_ssl: true,
            timeout: config::get_request_timeout(),
        }
    }
}

/// Authenticated client bound to one domain
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

fn parse_domain(domain: &str) -> Result<Url> {
    let invalid = |reason: String| Error::InvalidDomain {
        domain: domain.to_string(),
        reason,
    };

    let mut base = Url::parse(domain).map_err(|e| invalid(e.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

impl ApiClient {
    /// Create a client that sends `Authorization: Bearer <token>` on every request
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = parse_domain(&config.domain)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(Error::Client)?;

        Ok(Self { http, base })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn domain(&self) -> &str {
        self.base.as_str()
    }

    /// `{domain}/api/spaces/{space}/profiles/{profile}/{endpoint}/`, with
    /// `space` and `profile` percent-encoded as single path segments
    fn profile_url(&self, space: &str, profile: &str, endpoint: &str) -> String {
        let mut url = self.base.clone();
        // parse_domain already rejected URLs that cannot be a base
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(config::profile_segments(space, profile, endpoint));
        }
        url.to_string()
    }

    /// Listing endpoint for a profile's events
    pub fn events_url(&self, space: &str, profile: &str) -> String {
        self.profile_url(space, profile, GET_EVENTS_ENDPOINT)
    }

    /// Bulk-create endpoint for a profile's events
    pub fn bulk_create_events_url(&self, space: &str, profile: &str) -> String {
        self.profile_url(space, profile, CREATE_EVENTS_ENDPOINT)
    }
}
