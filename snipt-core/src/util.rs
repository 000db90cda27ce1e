//! Small helpers shared by the adapters.

use std::sync::RwLock;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::AdapterError;

const MAX_ERROR_BODY: usize = 512;

/// Replaces every newline flavour with `replacement` so multi-line titles stay
/// on one line in list output.
pub fn replace_newline(text: &str, replacement: &str) -> String {
    text.replace("\r\n", replacement)
        .replace('\r', replacement)
        .replace('\n', replacement)
}

/// Appends `path` to `base` as URL path segments.
///
/// Used both for file-expanded list URLs and for file filter keys, so the two
/// always compare equal.
pub fn join_url_path(base: &str, path: &str) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
    }
    url.to_string()
}

/// Interior-mutable routing label, settable through `&self`.
#[derive(Debug, Default)]
pub(crate) struct FilterKey(RwLock<String>);

impl FilterKey {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(RwLock::new(key.into()))
    }

    pub(crate) fn get(&self) -> String {
        match self.0.read() {
            Ok(key) => key.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn set(&self, key: &str) {
        match self.0.write() {
            Ok(mut current) => *current = key.to_string(),
            Err(poisoned) => *poisoned.into_inner() = key.to_string(),
        }
    }
}

/// Passes successful responses through and turns everything else into
/// [`AdapterError::Status`].
pub(crate) async fn expect_success(
    platform: &str,
    method: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    tracing::debug!(platform, method, %url, status = status.as_u16(), "Backend returned error status");
    Err(AdapterError::Status {
        platform: platform.to_string(),
        method: method.to_string(),
        url,
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn decode_json<T: DeserializeOwned>(
    platform: &str,
    response: reqwest::Response,
) -> Result<T, AdapterError> {
    let bytes = read_bytes(platform, response).await?;
    serde_json::from_slice(&bytes).map_err(|e| AdapterError::Decode {
        platform: platform.to_string(),
        message: e.to_string(),
    })
}

pub(crate) async fn read_bytes(
    platform: &str,
    response: reqwest::Response,
) -> Result<Vec<u8>, AdapterError> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|source| request_error(platform, source))
}

pub(crate) fn request_error(platform: &str, source: reqwest::Error) -> AdapterError {
    AdapterError::Request {
        platform: platform.to_string(),
        source,
    }
}

/// 401/403 while establishing identity means the credential is bad.
pub(crate) fn into_auth_error(err: AdapterError) -> AdapterError {
    match err {
        AdapterError::Status {
            platform,
            status,
            body,
            ..
        } if status == 401 || status == 403 => AdapterError::Auth {
            platform,
            message: format!("{status}: {body}"),
        },
        other => other,
    }
}
