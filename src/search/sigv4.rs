/// AWS Signature Version 4 request signing for managed clusters
use super::SearchError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AwsCredentials {
    /// Read the standard `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` /
    /// `AWS_SESSION_TOKEN` variables. Returns the name of the first missing
    /// variable on failure.
    pub fn from_env() -> Result<Self, String> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
        };
        let access_key_id =
            read("AWS_ACCESS_KEY_ID").ok_or_else(|| "AWS_ACCESS_KEY_ID".to_string())?;
        let secret_access_key =
            read("AWS_SECRET_ACCESS_KEY").ok_or_else(|| "AWS_SECRET_ACCESS_KEY".to_string())?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: read("AWS_SESSION_TOKEN"),
        })
    }
}

/// Request parts covered by the signature
pub(crate) struct SigningRequest<'a> {
    pub method: &'a str,
    /// Host header value (with port when non-default)
    pub host: &'a str,
    /// Percent-encoded path as sent on the wire
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub payload: &'a [u8],
}

/// Compute the headers to add to a request: `x-amz-date`, optionally
/// `x-amz-security-token`, and `authorization`.
pub(crate) fn sign(
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    request: &SigningRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, SearchError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = vec![
        ("host".to_string(), request.host.trim().to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.trim().to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = [
        request.method.to_string(),
        canonical_uri(request.path),
        canonical_query(request.query),
        canonical_headers,
        signed_headers.clone(),
        hex::encode(Sha256::digest(request.payload)),
    ]
    .join("\n");

    let scope = format!("{}/{}/{}/aws4_request", date, region, service);
    let string_to_sign = [
        ALGORITHM.to_string(),
        amz_date.clone(),
        scope.clone(),
        hex::encode(Sha256::digest(canonical_request.as_bytes())),
    ]
    .join("\n");

    let secret = format!("AWS4{}", credentials.secret_access_key);
    let k_date = hmac(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    let k_signing = hmac(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    );

    let mut out = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = &credentials.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    out.push(("authorization".to_string(), authorization));
    Ok(out)
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SearchError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SearchError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// RFC 3986 encoding with the unreserved set left as is
pub(crate) fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

// non-S3 services sign each path segment encoded a second time
fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
