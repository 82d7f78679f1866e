use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::config::JwtConfig;
use crate::state::AppState;

/// Discriminator claim distinguishing access from refresh tokens.
/// Email-confirmation tokens carry no scope at all.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user email
    pub iat: usize,
    pub exp: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<TokenScope>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid scope for token")]
    InvalidScope,
    #[error("could not validate credentials")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

const EMAIL_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::from_secs(access_ttl_seconds as u64),
            refresh_ttl: Duration::from_secs(refresh_ttl_seconds as u64),
        }
    }
}

impl JwtKeys {
    fn sign(&self, email: &str, ttl_seconds: i64, scope: Option<TokenScope>) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iat: now as usize,
            exp: (now + ttl_seconds) as usize,
            scope,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(sub = %email, scope = ?claims.scope, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str) -> anyhow::Result<String> {
        self.sign(email, self.access_ttl.as_secs() as i64, Some(TokenScope::Access))
    }

    pub fn sign_refresh(&self, email: &str) -> anyhow::Result<String> {
        self.sign(email, self.refresh_ttl.as_secs() as i64, Some(TokenScope::Refresh))
    }

    pub fn sign_email_token(&self, email: &str) -> anyhow::Result<String> {
        self.sign(email, EMAIL_TOKEN_TTL_SECONDS, None)
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Decodes a token and checks the scope claim. Returns the subject email.
    pub fn decode(&self, token: &str, expected: TokenScope) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        if claims.scope != Some(expected) {
            return Err(TokenError::InvalidScope);
        }
        Ok(claims.sub)
    }

    /// Decodes an email-confirmation token (no scope check).
    pub fn decode_email_token(&self, token: &str) -> Result<String, TokenError> {
        Ok(self.verify(token)?.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRef;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    #[tokio::test]
    async fn access_token_roundtrip() {
        let keys = make_keys();
        let token = keys.sign_access("user@example.com").expect("sign access");
        let sub = keys.decode(&token, TokenScope::Access).expect("decode");
        assert_eq!(sub, "user@example.com");
    }

    #[tokio::test]
    async fn refresh_token_roundtrip() {
        let keys = make_keys();
        let token = keys.sign_refresh("user@example.com").expect("sign refresh");
        let sub = keys.decode(&token, TokenScope::Refresh).expect("decode");
        assert_eq!(sub, "user@example.com");
    }

    #[tokio::test]
    async fn wrong_scope_is_rejected_distinctly() {
        let keys = make_keys();
        let token = keys.sign_access("user@example.com").expect("sign access");
        let err = keys.decode(&token, TokenScope::Refresh).unwrap_err();
        assert!(matches!(err, TokenError::InvalidScope));
    }

    #[tokio::test]
    async fn email_token_has_no_scope_and_decodes() {
        let keys = make_keys();
        let token = keys.sign_email_token("user@example.com").expect("sign");
        let sub = keys.decode_email_token(&token).expect("decode");
        assert_eq!(sub, "user@example.com");
        // an email token never passes a scoped decode
        let err = keys.decode(&token, TokenScope::Access).unwrap_err();
        assert!(matches!(err, TokenError::InvalidScope));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let keys = make_keys();
        let token = keys
            .sign("user@example.com", -3600, Some(TokenScope::Access))
            .expect("sign expired");
        let err = keys.decode(&token, TokenScope::Access).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let keys = make_keys();
        let mut token = keys.sign_access("user@example.com").expect("sign access");
        token.push('x');
        let err = keys.decode(&token, TokenScope::Access).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn scope_serializes_to_wire_names() {
        let json = serde_json::to_string(&TokenScope::Access).unwrap();
        assert_eq!(json, "\"access_token\"");
        let json = serde_json::to_string(&TokenScope::Refresh).unwrap();
        assert_eq!(json, "\"refresh_token\"");
    }
}
