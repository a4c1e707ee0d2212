//! ES256 bearer tokens for WeatherKit.
//!
//! [`RequestSigner`] holds a parsed P-256 private key and mints a
//! short-lived JWT per request: header `{alg: ES256, typ: JWT, kid}`,
//! claims `{iss: team id, sub: service id, aud, iat, exp}`. Key problems
//! surface in [`RequestSigner::new`], never on the first network call.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::model::WeatherKitCredentials;
use crate::error::WeathergateError;

pub const WEATHERKIT_AUDIENCE: &str = "weatherkit.apple.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct RequestSigner {
    team_id: String,
    key_id: String,
    service_id: String,
    key: EncodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("service_id", &self.service_id)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Parse the key and prove it can sign.
    pub fn new(credentials: &WeatherKitCredentials) -> Result<Self, WeathergateError> {
        let key = EncodingKey::from_ec_pem(credentials.private_key.as_bytes()).map_err(|e| {
            WeathergateError::Signing {
                source: Box::new(e),
            }
        })?;
        let signer = Self {
            team_id: credentials.team_id.clone(),
            key_id: credentials.key_id.clone(),
            service_id: credentials.service_id.clone(),
            key,
            lifetime: credentials.token_lifetime,
        };
        signer.validate()?;
        tracing::debug!(
            key_id = %signer.key_id,
            lifetime_secs = signer.lifetime.as_secs(),
            "weatherkit signer ready"
        );
        Ok(signer)
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn claims(&self, now: DateTime<Utc>) -> TokenClaims {
        let iat = now.timestamp();
        TokenClaims {
            iss: self.team_id.clone(),
            sub: self.service_id.clone(),
            aud: WEATHERKIT_AUDIENCE.to_string(),
            iat,
            exp: iat.saturating_add(self.lifetime.as_secs() as i64),
        }
    }

    /// Sign a token issued at `now`.
    pub fn sign(&self, now: DateTime<Utc>) -> Result<String, jsonwebtoken::errors::Error> {
        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.key_id.clone());
        jsonwebtoken::encode(&header, &self.claims(now), &self.key)
    }

    /// Mint a token and check its structure: three segments and `exp > iat`.
    pub fn validate(&self) -> Result<(), WeathergateError> {
        let token = self.sign(Utc::now()).map_err(|e| WeathergateError::Signing {
            source: Box::new(e),
        })?;
        let claims = decode_claims(&token).map_err(|msg| WeathergateError::Signing {
            source: msg.into(),
        })?;
        if claims.exp <= claims.iat {
            return Err(WeathergateError::Signing {
                source: "token lifetime must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Decode the claims segment of a compact JWT without verifying it.
pub fn decode_claims(token: &str) -> Result<TokenClaims, String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 token segments, found {}", parts.len()));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| format!("payload is not base64url: {e}"))?;
    serde_json::from_slice(&payload).map_err(|e| format!("payload is not valid claims: {e}"))
}
