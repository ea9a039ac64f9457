//! Signed S3 `GetObject` over plain HTTPS (AWS Signature Version 4).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::DocgridError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_REGION: &str = "us-east-1";

/// S3 access settings, read from the standard AWS environment variables.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack); path-style addressing.
    pub endpoint_url: Option<String>,
}

impl S3Settings {
    /// Load from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`,
    /// `AWS_REGION` / `AWS_DEFAULT_REGION` and `AWS_ENDPOINT_URL`.
    pub fn from_env() -> Result<Self, String> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let access_key_id =
            var("AWS_ACCESS_KEY_ID").ok_or("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = var("AWS_SECRET_ACCESS_KEY")
            .ok_or("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        Ok(S3Settings {
            access_key_id,
            secret_access_key,
            session_token: var("AWS_SESSION_TOKEN"),
            region: var("AWS_REGION")
                .or_else(|| var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint_url: var("AWS_ENDPOINT_URL"),
        })
    }
}

/// A GET request ready to send: URL plus the headers that were signed.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Sign a `GetObject` request for `bucket/key` at time `now`.
pub fn sign_get(settings: &S3Settings, bucket: &str, key: &str, now: DateTime<Utc>) -> SignedRequest {
    let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");

    let (scheme, host, canonical_uri) = match settings.endpoint_url {
        Some(ref endpoint) => {
            let (scheme, rest) = match endpoint.split_once("://") {
                Some((s, r)) => (s.to_string(), r),
                None => ("https".to_string(), endpoint.as_str()),
            };
            let host = rest.trim_end_matches('/').to_string();
            (scheme, host, format!("/{}/{}", uri_encode(bucket), encoded_key))
        }
        None => (
            "https".to_string(),
            format!("{}.s3.{}.amazonaws.com", bucket, settings.region),
            format!("/{}", encoded_key),
        ),
    };

    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(b"");

    let mut headers = vec![
        ("host".to_string(), host.clone()),
        ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = settings.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "GET\n{}\n\n{}\n{}\n{}",
        canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, settings.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key =
        derive_signing_key(&settings.secret_access_key, &date_stamp, &settings.region, "s3");
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        settings.access_key_id, credential_scope, signed_headers, signature
    );

    // reqwest derives Host from the URL.
    let mut out: Vec<(String, String)> = headers.into_iter().filter(|(k, _)| k != "host").collect();
    out.push(("authorization".to_string(), authorization));

    SignedRequest {
        url: format!("{}://{}{}", scheme, host, canonical_uri),
        headers: out,
    }
}

/// Describe an S3 error response body (`<Error><Code/><Message/></Error>`).
pub fn describe_error_body(xml: &str) -> Option<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut current: Option<Vec<u8>> = None;
    let mut code = None;
    let mut message = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => current = Some(e.local_name().as_ref().to_vec()),
            Ok(Event::Text(t)) => {
                let text = t.unescape().map(|s| s.into_owned()).unwrap_or_default();
                match current.as_deref() {
                    Some(b"Code") => code = Some(text),
                    Some(b"Message") => message = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    match (code, message) {
        (Some(c), Some(m)) => Some(format!("{c}: {m}")),
        (Some(c), None) => Some(c),
        (None, Some(m)) => Some(m),
        (None, None) => None,
    }
}

/// Fetch an object with a blocking client.
pub fn get_object(
    client: &reqwest::blocking::Client,
    settings: &S3Settings,
    bucket: &str,
    key: &str,
) -> Result<Vec<u8>, DocgridError> {
    let source_id = format!("s3://{}/{}", bucket, key);
    let unavailable = |reason: String| DocgridError::SourceUnavailable {
        source_id: source_id.clone(),
        reason,
    };

    let signed = sign_get(settings, bucket, key, Utc::now());
    let mut req = client.get(&signed.url);
    for (k, v) in &signed.headers {
        req = req.header(k.as_str(), v.as_str());
    }

    let resp = req.send().map_err(|e| unavailable(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        let detail = describe_error_body(&body).unwrap_or_else(|| "no error detail".into());
        return Err(unavailable(format!("S3 GetObject failed (HTTP {}): {}", status, detail)));
    }

    let bytes = resp.bytes().map_err(|e| unavailable(e.to_string()))?;
    Ok(bytes.to_vec())
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts any key length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Percent-encode everything except RFC 3986 unreserved characters.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}
