use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;

use crate::auth::build_auth_headers;
use crate::config::{AuthConfig, ClientConfig};
use crate::error::AgentError;

use super::retry_policy::RetryPolicy;
use super::{HttpResponse, Transport};

fn build_blocking_client(config: &ClientConfig) -> Result<reqwest::blocking::Client, AgentError> {
    let pool_idle_timeout = if config.pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.pool_idle_timeout_secs))
    };

    let mut builder = reqwest::blocking::Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout));

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| AgentError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !config.use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| AgentError::Config(format!("Failed to build HTTP client: {err}")))
}

/// Blocking HTTP transport with connection pooling and bounded retries.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    auth_headers: HeaderMap,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] for an invalid proxy URL or auth header,
    /// or when the TLS backend cannot be initialised.
    pub fn new(client: &ClientConfig, auth: &AuthConfig) -> Result<Self, AgentError> {
        Ok(Self {
            client: build_blocking_client(client)?,
            base_url: client.base_url.trim_end_matches('/').to_string(),
            auth_headers: build_auth_headers(auth)?,
            retry: RetryPolicy::new(client.retry_max_attempts),
        })
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<HttpResponse, AgentError> {
        let mut attempt = 0;
        loop {
            let request = self
                .client
                .post(url)
                .headers(headers.clone())
                .body(body.clone());

            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    let delay = self.retry.status_delay(status, response.headers(), attempt);
                    if let Some(delay) = delay {
                        tracing::debug!(
                            status = status.as_u16(),
                            retry_attempt = attempt + 1,
                            delay_ms = delay.as_millis(),
                            "retrying request after retriable status"
                        );
                        drop(response);
                        std::thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    let headers = response.headers().clone();
                    return Ok(HttpResponse::from_reader(status, headers, response));
                }
                Err(err) => {
                    let message = err.to_string();
                    let Some(delay) = self.retry.network_delay(&message, attempt) else {
                        return Err(AgentError::Network(message));
                    };
                    tracing::debug!(
                        retry_attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %message,
                        "retrying request after network error"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    fn auth_header(&self) -> HeaderMap {
        self.auth_headers.clone()
    }

    fn service_url(&self, path: &str) -> String {
        let mut url = String::with_capacity(self.base_url.len() + path.len() + 1);
        url.push_str(&self.base_url);
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: &str) -> HttpTransport {
        let client = ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        };
        let auth = AuthConfig {
            token: "Bearer t".to_string(),
            ..AuthConfig::default()
        };
        HttpTransport::new(&client, &auth).unwrap()
    }

    #[test]
    fn test_service_url_joins_paths() {
        let transport = transport("https://gateway.example.com/");
        assert_eq!(
            transport.service_url("/dte/api/v2/function_call/integrated"),
            "https://gateway.example.com/dte/api/v2/function_call/integrated"
        );
        assert_eq!(
            transport.service_url("v1/x"),
            "https://gateway.example.com/v1/x"
        );
    }

    #[test]
    fn test_auth_header_carries_token() {
        let headers = transport("http://localhost:1").auth_header();
        assert_eq!(headers.get("x-appbuilder-authorization").unwrap(), "Bearer t");
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        let client = ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            retry_max_attempts: 0,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&client, &AuthConfig::default()).unwrap();
        let url = transport.service_url("/x");
        let err = transport
            .post(&url, &transport.auth_header(), Bytes::from_static(b"{}"))
            .unwrap_err();
        assert!(matches!(err, AgentError::Network(_)));
    }
}
