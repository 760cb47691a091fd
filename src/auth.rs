use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::HeaderMap;

use crate::config::AuthConfig;
use crate::error::AgentError;

/// Build the headers sent with every request: the token under the
/// configured header name plus a JSON content type.
///
/// # Errors
///
/// Returns [`AgentError::Config`] when the header name or token is not a
/// valid HTTP header.
pub fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, AgentError> {
    let name = HeaderName::from_bytes(auth.header.trim().as_bytes())
        .map_err(|err| AgentError::Config(format!("invalid auth header name: {err}")))?;
    let mut value = HeaderValue::from_str(auth.token.trim())
        .map_err(|err| AgentError::Config(format!("invalid auth token: {err}")))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(name, value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
