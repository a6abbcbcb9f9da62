//! Signed tokens for authentication, email verification and password reset.
//!
//! # Formats
//!
//! Access, refresh and verification tokens share one format:
//!
//! ```text
//! base64url(claims_json) "." base64url(HMAC-SHA256(secret, first_segment))
//! ```
//!
//! Verification checks structure, then signature, then kind, then expiry, so
//! only a correctly signed token can ever be reported as expired.
//!
//! Password reset tokens are `"<timestamp base36>-<hex HMAC>"`, where the MAC
//! covers the user id, the current password hash, the verification flag and
//! the timestamp. Changing the password invalidates every outstanding token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use grocery_core::UserId;

use crate::config::TokenConfig;
use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Domain separator mixed into reset token MACs.
const RESET_SALT: &[u8] = b"grocery-api.password-reset";

/// Errors from token verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, tampered with, or of the wrong kind.
    #[error("invalid token")]
    Invalid,

    /// Correctly signed but past its expiry.
    #[error("token expired")]
    Expired,

    /// Claims could not be serialized or the key is unusable.
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// What a signed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    VerifyEmail,
}

/// Claims carried by a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: UserId,
    pub kind: TokenKind,
    /// Issued at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expires at, seconds since the Unix epoch.
    pub exp: i64,
    /// Unique token ID.
    pub jti: Uuid,
}

/// An access/refresh token pair returned on login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies tokens with a single HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    secret: SecretString,
    ttl: TokenConfig,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Create a new token service.
    #[must_use]
    pub const fn new(secret: SecretString, ttl: TokenConfig) -> Self {
        Self { secret, ttl }
    }

    /// Token lifetimes in use.
    #[must_use]
    pub const fn ttl(&self) -> &TokenConfig {
        &self.ttl
    }

    // =========================================================================
    // Signed tokens
    // =========================================================================

    /// Issue a signed token of `kind` for `user`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialized.
    pub fn issue(&self, user: UserId, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(user, kind, Utc::now().timestamp())
    }

    /// Issue an access and a refresh token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialized.
    pub fn issue_pair(&self, user: UserId) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user, TokenKind::Access)?,
            refresh: self.issue(user, TokenKind::Refresh)?,
        })
    }

    fn issue_at(&self, user: UserId, kind: TokenKind, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user,
            kind,
            iat: now,
            exp: now + self.lifetime(kind),
            jti: Uuid::new_v4(),
        };

        let payload =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);

        Ok(format!("{payload}.{signature}"))
    }

    /// Verify a signed token and check that it is of the expected kind.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the token is malformed, the signature
    /// does not match, or the kind differs. Returns `TokenError::Expired` if the
    /// token is genuine but stale.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, expected, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, expected: TokenKind, now: i64) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Invalid)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Invalid)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;

        if claims.kind != expected {
            return Err(TokenError::Invalid);
        }
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    const fn lifetime(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.ttl.access_ttl_secs,
            TokenKind::Refresh => self.ttl.refresh_ttl_secs,
            TokenKind::VerifyEmail => self.ttl.verify_ttl_secs,
        }
    }

    // =========================================================================
    // Password reset tokens
    // =========================================================================

    /// Make a password reset token bound to the user's current credentials.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the signing key is unusable.
    pub fn make_reset_token(&self, user: &User) -> Result<String, TokenError> {
        self.reset_token_at(user, Utc::now().timestamp())
    }

    /// Check a password reset token against the user's current credentials.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the token is malformed, was issued for
    /// different credentials, or is older than the reset lifetime.
    pub fn check_reset_token(&self, user: &User, token: &str) -> Result<(), TokenError> {
        self.check_reset_token_at(user, token, Utc::now().timestamp())
    }

    fn reset_token_at(&self, user: &User, ts: i64) -> Result<String, TokenError> {
        let ts36 = to_base36(ts);
        let mac = self.sign(&reset_message(user, &ts36))?;
        Ok(format!("{ts36}-{}", hex::encode(mac)))
    }

    fn check_reset_token_at(&self, user: &User, token: &str, now: i64) -> Result<(), TokenError> {
        let (ts36, hash) = token.split_once('-').ok_or(TokenError::Invalid)?;
        let ts = from_base36(ts36).ok_or(TokenError::Invalid)?;
        let hash = hex::decode(hash).map_err(|_| TokenError::Invalid)?;

        let mut mac = self.mac()?;
        mac.update(&reset_message(user, ts36));
        mac.verify_slice(&hash).map_err(|_| TokenError::Invalid)?;

        if now - ts > self.ttl.reset_ttl_secs {
            return Err(TokenError::Invalid);
        }
        Ok(())
    }

    // =========================================================================
    // HMAC
    // =========================================================================

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn reset_message(user: &User, ts36: &str) -> Vec<u8> {
    let mut message = RESET_SALT.to_vec();
    message.extend_from_slice(
        format!(
            "|{}|{}|{}|{}",
            user.id, user.password_hash, user.is_verified, ts36
        )
        .as_bytes(),
    );
    message
}

// =============================================================================
// uidb64
// =============================================================================

/// Encode a user ID for use in password reset links.
#[must_use]
pub fn encode_uid(id: UserId) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Decode a user ID from a password reset link.
///
/// # Errors
///
/// Returns `TokenError::Invalid` if the value is not base64 of a decimal ID.
pub fn decode_uid(uidb64: &str) -> Result<UserId, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(uidb64.trim_end_matches('='))
        .map_err(|_| TokenError::Invalid)?;
    let text = String::from_utf8(bytes).map_err(|_| TokenError::Invalid)?;
    text.parse::<i64>()
        .map(UserId::new)
        .map_err(|_| TokenError::Invalid)
}

// =============================================================================
// Encoding helpers
// =============================================================================

fn to_base36(mut n: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n <= 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // 0..36
        let digit = (n % 36) as usize;
        out.push(DIGITS.get(digit).copied().unwrap_or(b'0'));
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(s: &str) -> Option<i64> {
    if s.is_empty() || s.len() > 13 {
        return None;
    }
    i64::from_str_radix(s, 36).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use grocery_core::{Email, Username};

    fn service() -> TokenService {
        TokenService::new(
            SecretString::from("k7Qz!pR2@xW9#mN4$vB6^tY8&jH3*sL5"),
            TokenConfig::default(),
        )
    }

    fn user(password_hash: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            email: Email::parse("alice@example.com").unwrap(),
            username: Username::parse("alice").unwrap(),
            password_hash: password_hash.to_owned(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let token = tokens.issue(UserId::new(7), TokenKind::Access).unwrap();
        let claims = tokens.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, UserId::new(7));
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_wrong_kind_is_invalid() {
        let tokens = service();
        let token = tokens.issue(UserId::new(7), TokenKind::Refresh).unwrap();
        assert_eq!(
            tokens.verify(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_expired_and_invalid_are_distinct() {
        let tokens = service();
        let issued = Utc::now().timestamp() - 2 * 86_400;
        let stale = tokens
            .issue_at(UserId::new(7), TokenKind::VerifyEmail, issued)
            .unwrap();
        assert_eq!(
            tokens.verify(&stale, TokenKind::VerifyEmail),
            Err(TokenError::Expired)
        );

        assert_eq!(
            tokens.verify("garbage", TokenKind::VerifyEmail),
            Err(TokenError::Invalid)
        );

        // A stale token with a broken signature is invalid, not expired.
        let mut tampered = stale;
        tampered.push('x');
        assert_eq!(
            tokens.verify(&tampered, TokenKind::VerifyEmail),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let other = TokenService::new(
            SecretString::from("Zp4#Lm8!Qw2@Er6$Ty0^Ui3&Op7*As1%"),
            TokenConfig::default(),
        );
        let token = other.issue(UserId::new(7), TokenKind::Access).unwrap();
        assert_eq!(
            service().verify(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_reset_token_bound_to_password() {
        let tokens = service();
        let before = user("hash-1");
        let token = tokens.make_reset_token(&before).unwrap();
        assert!(tokens.check_reset_token(&before, &token).is_ok());

        let after = user("hash-2");
        assert_eq!(
            tokens.check_reset_token(&after, &token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_reset_token_expires() {
        let tokens = service();
        let u = user("hash-1");
        let issued = Utc::now().timestamp() - 4 * 86_400;
        let token = tokens.reset_token_at(&u, issued).unwrap();
        assert_eq!(
            tokens.check_reset_token(&u, &token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_reset_token_rejects_garbage() {
        let tokens = service();
        let u = user("hash-1");
        for token in ["", "nodash", "zz-zz", "abc-123"] {
            assert_eq!(tokens.check_reset_token(&u, token), Err(TokenError::Invalid));
        }
    }

    #[test]
    fn test_uid_encoding() {
        let encoded = encode_uid(UserId::new(42));
        assert_eq!(encoded, "NDI");
        assert_eq!(decode_uid(&encoded).unwrap(), UserId::new(42));
        assert_eq!(decode_uid("NDI=").unwrap(), UserId::new(42));
        assert_eq!(decode_uid("!!"), Err(TokenError::Invalid));
        assert_eq!(decode_uid("YWJj"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_base36_roundtrip() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(from_base36(&to_base36(1_700_000_000)), Some(1_700_000_000));
    }
}
