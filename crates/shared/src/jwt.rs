//! JWT token utilities using RS256 algorithm.
//!
//! Access and refresh tokens carry the user's role explicitly so that
//! authorization never depends on ambient session lookups.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID (unique token identifier)
    pub jti: String,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Role of the subject (`ADMIN` or `USER`)
    pub role: String,
    /// Set while an admin still has to rotate a temporary password
    #[serde(default)]
    pub pwd_change_required: bool,
}

/// Type of JWT token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub role: String,
    pub password_change_required: bool,
}

/// Configuration for JWT token generation and validation.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Access token expiration in seconds
    pub access_token_expiry_secs: i64,
    /// Refresh token expiration in seconds
    pub refresh_token_expiry_secs: i64,
    /// Leeway in seconds for clock skew tolerance
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("refresh_token_expiry_secs", &self.refresh_token_expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

impl JwtConfig {
    /// Creates a new JwtConfig from an RSA key pair in PEM format.
    pub fn new(
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_expiry_secs: i64,
        refresh_token_expiry_secs: i64,
    ) -> Result<Self, JwtError> {
        Self::with_leeway(
            private_key_pem,
            public_key_pem,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            DEFAULT_LEEWAY_SECS,
        )
    }

    /// Creates a new JwtConfig from an RSA key pair in PEM format with custom leeway.
    pub fn with_leeway(
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_expiry_secs: i64,
        refresh_token_expiry_secs: i64,
        leeway_secs: u64,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid private key: {}", e)))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            leeway_secs,
        })
    }

    /// Creates a JwtConfig for testing with HS256 symmetric key.
    /// DO NOT use in production - only for tests.
    #[cfg(test)]
    pub fn new_for_testing(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry_secs: 900,
            refresh_token_expiry_secs: 604800,
            leeway_secs: 0,
        }
    }

    /// Generates an access token for the given subject.
    pub fn generate_access_token(
        &self,
        subject: &TokenSubject,
    ) -> Result<(String, String), JwtError> {
        self.generate_token(subject, TokenType::Access, self.access_token_expiry_secs)
    }

    /// Generates a refresh token for the given subject.
    pub fn generate_refresh_token(
        &self,
        subject: &TokenSubject,
    ) -> Result<(String, String), JwtError> {
        self.generate_token(subject, TokenType::Refresh, self.refresh_token_expiry_secs)
    }

    fn generate_token(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        expiry_secs: i64,
    ) -> Result<(String, String), JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let exp = (now + Duration::seconds(expiry_secs)).timestamp();

        let claims = Claims {
            sub: subject.user_id.to_string(),
            exp,
            iat: now.timestamp(),
            jti: jti.clone(),
            token_type,
            role: subject.role.clone(),
            pwd_change_required: subject.password_change_required,
        };

        let header = Header::new(self.algorithm());

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, jti))
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm());
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Validates an access token specifically.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }

    /// Validates a refresh token specifically.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }

    /// Tests sign with HS256, production with RS256.
    fn algorithm(&self) -> Algorithm {
        #[cfg(test)]
        {
            Algorithm::HS256
        }
        #[cfg(not(test))]
        {
            Algorithm::RS256
        }
    }
}

/// Extracts user ID from validated claims.
pub fn extract_user_id(claims: &Claims) -> Result<Uuid, JwtError> {
    Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)
}
