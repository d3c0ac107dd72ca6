//! JWT token utilities for authentication and session refresh.
//!
//! Provides access/refresh token minting, verification with a distinguishable
//! expiry error, and claims helpers.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Config, seconds};

/// Kind of token carried in the `typ` claim.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims structure shared by access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub typ: TokenType,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issued at timestamp
    pub iat: i64,
    /// Unique token ID
    pub jti: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// JWT token utility for creating and validating tokens
#[derive(Clone)]
pub struct JwtUtils {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtUtils {
    /// Create a new JwtUtils instance from the loaded configuration
    pub fn new(config: &Config) -> Self {
        JwtUtils {
            access_encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: seconds(config.access_token_ttl_seconds),
            refresh_ttl: seconds(config.refresh_token_ttl_seconds),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint a new access + refresh token pair for a user.
    pub fn issue(&self, user_id: &str) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let access_token = self.sign(user_id, TokenType::Access, now, access_expires_at)?;
        let refresh_token = self.sign(user_id, TokenType::Refresh, now, refresh_expires_at)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            // Second precision, matching the `exp` claim.
            refresh_expires_at: timestamp_to_datetime(refresh_expires_at.timestamp()),
        })
    }

    pub(crate) fn sign(
        &self,
        user_id: &str,
        typ: TokenType,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            typ,
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, self.encoding_key(typ))
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validate signature, expiry, and token type.
    pub fn validate_token(&self, token: &str, typ: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, self.decoding_key(typ), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        if claims.typ != typ {
            return Err(TokenError::Invalid("unexpected token type".to_string()));
        }

        Ok(claims)
    }

    /// Claims of a correctly signed token, whether or not it has expired.
    ///
    /// Returns `None` for tokens with a bad signature or malformed payload.
    pub fn peek(&self, token: &str, typ: TokenType) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, self.decoding_key(typ), &validation)
            .ok()
            .map(|data| data.claims)
            .filter(|claims| claims.typ == typ)
    }

    fn encoding_key(&self, typ: TokenType) -> &EncodingKey {
        match typ {
            TokenType::Access => &self.access_encoding_key,
            TokenType::Refresh => &self.refresh_encoding_key,
        }
    }

    fn decoding_key(&self, typ: TokenType) -> &DecodingKey {
        match typ {
            TokenType::Access => &self.access_decoding_key,
            TokenType::Refresh => &self.refresh_decoding_key,
        }
    }
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired_token(utils: &JwtUtils, typ: TokenType) -> String {
        let now = Utc::now();
        utils
            .sign(
                "user-1",
                typ,
                now - Duration::hours(2),
                now - Duration::hours(1),
            )
            .unwrap()
    }

    #[test]
    fn issued_pair_validates() {
        let utils = JwtUtils::new(&Config::for_tests());
        let pair = utils.issue("user-1").unwrap();

        let access = utils
            .validate_token(&pair.access_token, TokenType::Access)
            .unwrap();
        assert_eq!(access.user_id(), "user-1");
        assert_eq!(access.typ, TokenType::Access);

        let refresh = utils
            .validate_token(&pair.refresh_token, TokenType::Refresh)
            .unwrap();
        assert_eq!(refresh.exp, pair.refresh_expires_at.timestamp());
        assert!(pair.refresh_expires_at - Utc::now() > Duration::days(6));
    }

    #[test]
    fn two_pairs_in_the_same_second_differ() {
        let utils = JwtUtils::new(&Config::for_tests());
        let a = utils.issue("user-1").unwrap();
        let b = utils.issue("user-1").unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);
        assert_ne!(a.access_token, b.access_token);
    }

    #[test]
    fn expired_token_is_distinguishable() {
        let utils = JwtUtils::new(&Config::for_tests());
        let token = expired_token(&utils, TokenType::Access);
        assert_eq!(
            utils.validate_token(&token, TokenType::Access).unwrap_err(),
            TokenError::Expired
        );
        assert_eq!(
            utils.peek(&token, TokenType::Access).unwrap().user_id(),
            "user-1"
        );
    }

    #[test]
    fn wrong_type_or_secret_is_invalid() {
        let utils = JwtUtils::new(&Config::for_tests());
        let pair = utils.issue("user-1").unwrap();
        assert!(matches!(
            utils.validate_token(&pair.refresh_token, TokenType::Access),
            Err(TokenError::Invalid(_))
        ));

        let mut other = Config::for_tests();
        other.jwt_secret = "another-secret".to_string();
        let other = JwtUtils::new(&other);
        assert!(matches!(
            other.validate_token(&pair.access_token, TokenType::Access),
            Err(TokenError::Invalid(_))
        ));
        assert!(other.peek(&pair.access_token, TokenType::Access).is_none());
    }

    #[test]
    fn garbage_is_invalid() {
        let utils = JwtUtils::new(&Config::for_tests());
        assert!(matches!(
            utils.validate_token("not-a-jwt", TokenType::Access),
            Err(TokenError::Invalid(_))
        ));
    }
}
