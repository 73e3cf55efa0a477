use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SignatureParts {
    pub ts: Option<String>,
    pub v1: Option<String>,
}

/// Parses `ts=...,v1=...`. Unknown keys and malformed parts are skipped.
pub fn parse_signature_header(header: &str) -> SignatureParts {
    let mut parts = SignatureParts::default();
    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "ts" => parts.ts = Some(value.to_string()),
            "v1" => parts.v1 = Some(value.to_string()),
            _ => {}
        }
    }
    parts
}

pub fn manifest(data_id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{};request-id:{};ts:{};", data_id, request_id, ts)
}

pub fn sign_manifest(manifest: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(manifest.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the provider's `x-signature` header. With no secret configured the
/// check passes; callers decide at startup whether that mode is allowed.
pub fn verify(
    signature_header: Option<&str>,
    request_id: Option<&str>,
    data_id: Option<&str>,
    secret: Option<&str>,
) -> bool {
    let Some(secret) = secret else {
        return true;
    };

    let parts = parse_signature_header(signature_header.unwrap_or(""));
    let (Some(ts), Some(v1)) = (parts.ts, parts.v1) else {
        return false;
    };
    let request_id = request_id.filter(|v| !v.is_empty());
    let data_id = data_id.filter(|v| !v.is_empty());
    let (Some(request_id), Some(data_id)) = (request_id, data_id) else {
        return false;
    };

    let Some(expected) = sign_manifest(&manifest(data_id, request_id, &ts), secret) else {
        return false;
    };
    expected.as_bytes().ct_eq(v1.as_bytes()).into()
}
