/// Presigned URL minting and verification
use crate::error::{MediaError, MediaResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// HTTP method a presigned URL is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresignMethod {
    Get,
    Put,
    Delete,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
            PresignMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for PresignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signs object URLs with a shared secret
///
/// URLs take the form `{base}/objects/{key}?method=GET&expires={unix}&signature={hex}`.
/// The signature is HMAC-SHA256 over `method\nkey\nexpires`.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            secret: secret.into().into_bytes(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn mac(&self, method: PresignMethod, key: &str, expires: i64) -> MediaResult<HmacSha256> {
        let mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MediaError::Internal(format!("Invalid signing key: {}", e)))?;
        Ok(mac.chain_update(format!("{}\n{}\n{}", method.as_str(), key, expires)))
    }

    /// Mint a URL valid for `ttl` from now
    pub fn sign(&self, method: PresignMethod, key: &str, ttl: Duration) -> MediaResult<String> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        self.sign_until(method, key, expires)
    }

    /// Mint a URL valid until the given unix timestamp
    pub fn sign_until(&self, method: PresignMethod, key: &str, expires: i64) -> MediaResult<String> {
        let signature = hex::encode(self.mac(method, key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/objects/{}?method={}&expires={}&signature={}",
            self.base_url,
            key,
            method.as_str(),
            expires,
            signature
        ))
    }

    /// Check a presented signature against the current time
    pub fn verify(
        &self,
        method: PresignMethod,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> MediaResult<()> {
        self.verify_at(method, key, expires, signature, Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        method: PresignMethod,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> MediaResult<()> {
        let presented = hex::decode(signature)
            .map_err(|_| MediaError::PermissionDenied("Malformed URL signature".to_string()))?;
        self.mac(method, key, expires)?
            .verify_slice(&presented)
            .map_err(|_| MediaError::PermissionDenied("Invalid URL signature".to_string()))?;

        if now > expires {
            return Err(MediaError::PermissionDenied("URL has expired".to_string()));
        }

        Ok(())
    }
}
