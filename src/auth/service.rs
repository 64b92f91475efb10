use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, warn};

use super::TokenClaims;
use crate::user;

#[async_trait]
pub trait AuthService {
    async fn validate(&self, token: &str) -> super::Result<user::Sub>;

    /// Accepts only tokens granted `scope`, as held by backend callers.
    async fn validate_scope(&self, token: &str, scope: &'static str) -> super::Result<user::Sub>;

    async fn issue(&self, sub: &user::Sub, ttl: Duration) -> super::Result<String>;

    async fn issue_scoped(
        &self,
        sub: &user::Sub,
        scope: &str,
        ttl: Duration,
    ) -> super::Result<String>;
}

/// HS256 tokens signed with a secret shared with the identity subsystem.
#[derive(Clone)]
pub struct JwtAuthService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl JwtAuthService {
    pub fn new(secret: &str) -> Self {
        let validation = {
            let mut v = Validation::new(Algorithm::HS256);
            v.set_required_spec_claims(&["exp", "sub"]);
            v
        };

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(validation),
        }
    }
}

impl JwtAuthService {
    fn claims_of(&self, token: &str) -> super::Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                    warn!("Failed to decode JWT: {e:?}");
                    super::Error::TokenMalformed
                }
                _ => {
                    debug!("Rejected JWT: {e:?}");
                    super::Error::InvalidToken
                }
            })
    }

    fn sign(&self, sub: &user::Sub, scope: Option<&str>, ttl: Duration) -> super::Result<String> {
        let claims = TokenClaims {
            sub: sub.clone(),
            exp: jsonwebtoken::get_current_timestamp() + ttl.as_secs(),
            scope: scope.map(String::from),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    async fn validate(&self, token: &str) -> super::Result<user::Sub> {
        self.claims_of(token).map(|claims| claims.sub)
    }

    async fn validate_scope(&self, token: &str, scope: &'static str) -> super::Result<user::Sub> {
        let claims = self.claims_of(token)?;
        if !claims.has_scope(scope) {
            debug!("{} is not granted '{scope}'", claims.sub);
            return Err(super::Error::MissingScope(scope));
        }
        Ok(claims.sub)
    }

    async fn issue(&self, sub: &user::Sub, ttl: Duration) -> super::Result<String> {
        self.sign(sub, None, ttl)
    }

    async fn issue_scoped(
        &self,
        sub: &user::Sub,
        scope: &str,
        ttl: Duration,
    ) -> super::Result<String> {
        self.sign(sub, Some(scope), ttl)
    }
}
