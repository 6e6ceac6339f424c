use std::sync::Arc;
use std::time::{Duration, Instant};

use http::HeaderMap;
use http::header;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value;
use tokio::sync::RwLock;

/// The authenticated Arena caller: the login that signed in and the person
/// record it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub login_id: String,
    pub person_id: i32,
}

#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer: String,
    pub audience: Option<String>,
    pub jwks_url: Option<String>,
    pub jwks_json: Option<String>,
    pub jwks_timeout: Duration,
    pub jwks_refresh_ttl: Duration,
    pub clock_skew: Duration,
    pub login_id_claim: String,
    pub person_id_claim: String,
}

#[derive(Debug, Clone)]
pub struct AuthError {
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "ERR_AUTH_INVALID",
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuthError {}

#[derive(Clone)]
pub struct OidcAuthenticator {
    config: OidcConfig,
    http: reqwest::Client,
    jwks: Arc<RwLock<JwksCache>>,
}

#[derive(Debug)]
struct JwksCache {
    jwks: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl OidcAuthenticator {
    pub async fn new(config: OidcConfig) -> Result<Self, AuthError> {
        if config.issuer.trim().is_empty() {
            return Err(AuthError {
                code: "ERR_INVALID_CONFIG",
                message: "oidc issuer must be non-empty".to_string(),
            });
        }

        for (name, claim) in [
            ("login_id_claim", &config.login_id_claim),
            ("person_id_claim", &config.person_id_claim),
        ] {
            if claim.trim().is_empty() {
                return Err(AuthError {
                    code: "ERR_INVALID_CONFIG",
                    message: format!("oidc {} must be non-empty", name),
                });
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.jwks_timeout)
            .build()
            .map_err(|_| AuthError {
                code: "ERR_INTERNAL",
                message: "failed to initialize oidc http client".to_string(),
            })?;

        let mut cache = JwksCache {
            jwks: None,
            fetched_at: None,
        };
        cache.refresh(&http, &config).await?;

        Ok(Self {
            config,
            http,
            jwks: Arc::new(RwLock::new(cache)),
        })
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;

        let header =
            decode_header(&token).map_err(|_| AuthError::invalid("invalid JWT header"))?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::invalid("unsupported JWT alg (expected RS256)"));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid("JWT header missing kid"))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(std::slice::from_ref(&self.config.issuer));
        if let Some(audience) = self.config.audience.as_ref() {
            validation.set_audience(std::slice::from_ref(audience));
        }
        validation.leeway = self.config.clock_skew.as_secs();

        let decoded = decode::<Value>(&token, &decoding_key, &validation)
            .map_err(|_| AuthError::invalid("JWT validation failed"))?;

        let claims = decoded.claims;

        Ok(Principal {
            login_id: claim_string(&claims, &self.config.login_id_claim)?,
            person_id: claim_person_id(&claims, &self.config.person_id_claim)?,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.jwks.read().await;
            if let Some(jwk) = cache.jwk_for_kid(kid) {
                return DecodingKey::from_jwk(jwk)
                    .map_err(|_| AuthError::invalid("failed to parse JWK decoding key"));
            }
        }

        {
            let mut cache = self.jwks.write().await;
            let refresh_needed = cache
                .fetched_at
                .map(|t| t.elapsed() > self.config.jwks_refresh_ttl)
                .unwrap_or(true);
            if refresh_needed {
                tracing::debug!(kid, "auth.jwks_refresh");
                cache.refresh(&self.http, &self.config).await?;
            }

            if let Some(jwk) = cache.jwk_for_kid(kid) {
                return DecodingKey::from_jwk(jwk)
                    .map_err(|_| AuthError::invalid("failed to parse JWK decoding key"));
            }
        }

        Err(AuthError::invalid("JWT kid not found in JWKS"))
    }
}

impl JwksCache {
    fn jwk_for_kid(&self, kid: &str) -> Option<&jsonwebtoken::jwk::Jwk> {
        self.jwks.as_ref()?.find(kid)
    }

    async fn refresh(
        &mut self,
        http: &reqwest::Client,
        config: &OidcConfig,
    ) -> Result<(), AuthError> {
        let jwks = if let Some(jwks_json) = config.jwks_json.as_ref() {
            serde_json::from_str::<JwkSet>(jwks_json).map_err(|_| AuthError {
                code: "ERR_INVALID_CONFIG",
                message: "ARENA_OIDC_JWKS_JSON is not valid JWKS JSON".to_string(),
            })?
        } else if let Some(url) = config.jwks_url.as_ref() {
            http.get(url)
                .send()
                .await
                .map_err(|_| AuthError {
                    code: "ERR_AUTH_UNAVAILABLE",
                    message: "failed to fetch JWKS".to_string(),
                })?
                .error_for_status()
                .map_err(|_| AuthError {
                    code: "ERR_AUTH_UNAVAILABLE",
                    message: "JWKS endpoint returned non-success status".to_string(),
                })?
                .json::<JwkSet>()
                .await
                .map_err(|_| AuthError {
                    code: "ERR_AUTH_UNAVAILABLE",
                    message: "failed to parse JWKS JSON".to_string(),
                })?
        } else {
            return Err(AuthError {
                code: "ERR_INVALID_CONFIG",
                message: "oidc requires jwks_url or jwks_json".to_string(),
            });
        };

        self.jwks = Some(jwks);
        self.fetched_at = Some(Instant::now());
        Ok(())
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError {
            code: "ERR_AUTH_REQUIRED",
            message: "missing Authorization header".to_string(),
        })?;

    let token = authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::invalid("Authorization must be a Bearer token"))?;

    if token.trim().is_empty() {
        return Err(AuthError::invalid("Bearer token is empty"));
    }

    Ok(token.to_string())
}

fn claim_string(claims: &Value, claim: &str) -> Result<String, AuthError> {
    claims
        .get(claim)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AuthError::invalid(format!(
                "required claim `{}` is missing or not a string",
                claim
            ))
        })
}

/// Person ids arrive either as JSON numbers or as numeric strings.
fn claim_person_id(claims: &Value, claim: &str) -> Result<i32, AuthError> {
    let parsed = match claims.get(claim) {
        Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    };

    parsed.filter(|id| *id > 0).ok_or_else(|| {
        AuthError::invalid(format!(
            "required claim `{}` must be a positive person id",
            claim
        ))
    })
}
