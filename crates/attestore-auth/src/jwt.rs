//! Bearer-token validation against a Keycloak-style JWKS endpoint.
//! RSA-family signatures only; keys are cached in process memory keyed
//! by `kid` so steady-state validation never touches the network.
//!
//! Cache entries carry a TTL rather than living forever: a `kid` that
//! verification rejects as an invalid signature triggers one forced
//! refetch before the token is rejected, so key rotation is picked up
//! without waiting out the TTL.

use crate::error::AuthError;
use crate::identity::Identity;
use dashmap::DashMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};

const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const JWKS_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
    alg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    preferred_username: Option<String>,
    email: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    realm_access: RealmAccess,
}

#[derive(Debug, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

/// Validates bearer tokens issued by a single Keycloak realm, fetching
/// and caching the realm's JWKS on first use of an unseen `kid`.
pub struct JwtValidator {
    keycloak_url: String,
    realm: String,
    http: reqwest::Client,
    keys: DashMap<String, CachedKey>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    fetched_at: Instant,
}

impl JwtValidator {
    #[must_use]
    pub fn new(keycloak_url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            keycloak_url: keycloak_url.into(),
            realm: realm.into(),
            http: reqwest::Client::builder()
                .timeout(JWKS_FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            keys: DashMap::new(),
        }
    }

    fn certs_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/certs",
            self.keycloak_url.trim_end_matches('/'),
            self.realm
        )
    }

    async fn key_for(&self, kid: &str, force_refresh: bool) -> Result<DecodingKey, AuthError> {
        if !force_refresh {
            if let Some(entry) = self.keys.get(kid) {
                if entry.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(entry.key.clone());
                }
            }
        }

        let url = self.certs_url();
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchFailed(url.clone(), e.to_string()))?;
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchFailed(url.clone(), e.to_string()))?;

        let fetched_at = Instant::now();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            if let Ok(key) = DecodingKey::from_rsa_components(n, e) {
                self.keys.insert(jwk.kid.clone(), CachedKey { key, fetched_at });
                let _ = jwk.alg;
            }
        }

        self.keys
            .get(kid)
            .map(|entry| entry.key.clone())
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string()))
    }

    /// Validates `token` and extracts an [`Identity`] from its claims.
    /// A signature failure against the cached key triggers one forced
    /// JWKS refetch before the token is rejected, so rotation doesn't
    /// require waiting out the cache TTL.
    pub async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        match header.alg {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {}
            other => return Err(AuthError::UnsupportedAlgorithm(format!("{other:?}"))),
        }
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;

        let key = self.key_for(&kid, false).await?;
        let claims = match decode::<Claims>(token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                let key = self.key_for(&kid, true).await?;
                decode::<Claims>(token, &key, &validation)
                    .map_err(|e| AuthError::InvalidToken(e.to_string()))?
                    .claims
            }
            Err(e) => return Err(AuthError::InvalidToken(e.to_string())),
        };

        Ok(Identity {
            user_id: claims.sub,
            username: claims.preferred_username,
            email: claims.email,
            groups: claims.groups,
            roles: claims.realm_access.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certs_url_follows_keycloak_convention() {
        let validator = JwtValidator::new("https://idp.example.com/", "attestore");
        assert_eq!(
            validator.certs_url(),
            "https://idp.example.com/realms/attestore/protocol/openid-connect/certs"
        );
    }

    #[tokio::test]
    async fn unseen_kid_without_network_fails_with_unknown_key() {
        let validator = JwtValidator::new("http://127.0.0.1:0", "attestore");
        let result = validator.key_for("missing", false).await;
        assert!(result.is_err());
    }
}
