//! Verification of Firebase ID tokens against Google's published signing keys.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::auth::{AuthError, TokenVerifier, VerifiedIdentity};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Unknown key ids never trigger more than one fetch per interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Claims of a Firebase ID token this server reads
#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
}

pub struct FirebaseVerifier {
    project_id: String,
    http: reqwest::Client,
    keys: RwLock<KeyCache>,
}

#[derive(Default)]
struct KeyCache {
    set: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn find(&self, kid: &str) -> Option<Result<DecodingKey, AuthError>> {
        self.set.as_ref().and_then(|set| set.find(kid)).map(|jwk| {
            DecodingKey::from_jwk(jwk).map_err(|e| AuthError::KeysUnavailable(e.to_string()))
        })
    }

    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL)
    }
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            http: reqwest::Client::new(),
            keys: RwLock::new(KeyCache::default()),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation
    }

    /// Decoding key for `kid`, refreshing the cached key set when it is
    /// unknown and the last fetch is older than [`MIN_REFRESH_INTERVAL`]
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.find(kid) {
            return key;
        }

        let mut cache = self.keys.write().await;
        // another request may have refreshed while we waited
        if let Some(key) = cache.find(kid) {
            return key;
        }
        if cache.is_fresh() {
            return Err(AuthError::Rejected(format!("unknown key id {kid}")));
        }

        debug!("Fetching signing keys for kid {}", kid);
        cache.fetched_at = Some(Instant::now());
        let set: JwkSet = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;
        info!("Loaded {} signing keys", set.keys.len());
        cache.set = Some(set);

        cache
            .find(kid)
            .unwrap_or_else(|| Err(AuthError::Rejected(format!("unknown key id {kid}"))))
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Rejected(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Rejected(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Rejected("missing key id".to_string()))?;

        let key = self.key_for(&kid).await?;
        let data = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| AuthError::Rejected(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::Rejected("empty subject".to_string()));
        }
        Ok(VerifiedIdentity {
            uid: data.claims.sub,
            email: data.claims.email,
        })
    }
}
