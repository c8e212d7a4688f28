//! V4 signed URLs for Cloud Storage
//!
//! Builds the canonical request and string-to-sign for a path-style GET URL
//! signed with `GOOG4-RSA-SHA256`. Signing itself is delegated so the key
//! never leaves the token provider.

use crate::config::MAX_SIGNED_URL_TTL_SECS;
use crate::error::GatewayError;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::time::Duration;

const ALGORITHM: &str = "GOOG4-RSA-SHA256";
const SIGNED_HEADERS: &str = "host";

/// Everything needed to sign one read URL
#[derive(Debug, Clone)]
pub struct SignedUrlRequest<'a> {
    /// Storage endpoint, e.g. `https://storage.googleapis.com`
    pub endpoint: &'a str,
    pub bucket: &'a str,
    pub object: &'a str,
    pub client_email: &'a str,
    pub ttl: Duration,
    pub now: DateTime<Utc>,
}

/// Intermediate values, kept separate so they can be inspected in tests
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalParts {
    pub base_url: String,
    pub canonical_uri: String,
    pub canonical_query: String,
    pub string_to_sign: String,
}

/// RFC 3986 unreserved characters pass through
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');
const OBJECT_PATH: &AsciiSet = &COMPONENT.remove(b'/');

/// Percent-encode per RFC 3986, optionally keeping `/`
fn uri_encode(input: &str, keep_slash: bool) -> String {
    let set = if keep_slash { OBJECT_PATH } else { COMPONENT };
    utf8_percent_encode(input, set).to_string()
}

pub fn canonical_parts(request: &SignedUrlRequest<'_>) -> Result<CanonicalParts, GatewayError> {
    let ttl_secs = request.ttl.as_secs();
    if ttl_secs == 0 || ttl_secs > MAX_SIGNED_URL_TTL_SECS {
        return Err(GatewayError::InvalidExpiry {
            requested: ttl_secs,
            max: MAX_SIGNED_URL_TTL_SECS,
        });
    }

    let endpoint = reqwest::Url::parse(request.endpoint)
        .map_err(|e| GatewayError::Signing(format!("Invalid storage endpoint: {}", e)))?;
    let host = match (endpoint.host_str(), endpoint.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(GatewayError::Signing("Storage endpoint has no host".to_string())),
    };
    let base_url = format!("{}://{}", endpoint.scheme(), host);

    let datetime = request.now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = request.now.format("%Y%m%d").to_string();
    let credential_scope = format!("{}/auto/storage/goog4_request", date);
    let credential = format!("{}/{}", request.client_email, credential_scope);

    let canonical_uri = format!(
        "/{}/{}",
        uri_encode(request.bucket, false),
        uri_encode(request.object, true)
    );

    // Already in sorted order
    let query = [
        ("X-Goog-Algorithm", ALGORITHM.to_string()),
        ("X-Goog-Credential", credential),
        ("X-Goog-Date", datetime.clone()),
        ("X-Goog-Expires", ttl_secs.to_string()),
        ("X-Goog-SignedHeaders", SIGNED_HEADERS.to_string()),
    ];
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k, false), uri_encode(v, false)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "GET\n{}\n{}\nhost:{}\n\n{}\nUNSIGNED-PAYLOAD",
        canonical_uri, canonical_query, host, SIGNED_HEADERS
    );
    let hashed_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM, datetime, credential_scope, hashed_request
    );

    Ok(CanonicalParts {
        base_url,
        canonical_uri,
        canonical_query,
        string_to_sign,
    })
}

/// Produce the full signed URL using `sign` for the RSA-SHA256 signature.
pub fn signed_read_url<F>(request: &SignedUrlRequest<'_>, sign: F) -> Result<String, GatewayError>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, GatewayError>,
{
    let parts = canonical_parts(request)?;
    let signature = hex::encode(sign(parts.string_to_sign.as_bytes())?);

    Ok(format!(
        "{}{}?{}&X-Goog-Signature={}",
        parts.base_url, parts.canonical_uri, parts.canonical_query, signature
    ))
}
