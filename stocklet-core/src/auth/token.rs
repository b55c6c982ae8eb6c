use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime of every issued token.
pub const TOKEN_TTL_MINUTES: i64 = 15;

/// Tolerance applied to `exp` when verifying.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

/// Tokens with less than this remaining (plus skew) are reissued.
pub const REFRESH_WINDOW_MINUTES: i64 = 5;

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's UUID as a string
    pub sub: String,
    pub email: String,
    /// Unique token id, the revocation key
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::BadSubject)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id")]
    BadSubject,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Signs and verifies HS256 session tokens.
///
/// Expiry is checked against an explicit `now` instead of the system clock
/// so the lifecycle can be exercised deterministically.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl TokenService {
    pub fn new(secret: &str, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let audience = audience.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_audience(&[audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
            audience,
        }
    }

    /// Signs a new token for `user_id` with a fresh jti.
    pub fn issue(&self, user_id: Uuid, email: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(TOKEN_TTL_MINUTES)).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken { token, claims })
    }

    /// Verifies signature, issuer, audience and expiry (with skew) at `now`.
    ///
    /// Revocation is not checked here; see `AuthService::resolve_session`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        if now.timestamp() > claims.exp + CLOCK_SKEW_SECONDS {
            return Err(TokenError::Expired);
        }

        claims.user_id()?;
        Ok(claims)
    }

    /// Whether a still-valid token expiring at `expires_at` is close enough
    /// to expiry to be reissued.
    pub fn needs_refresh(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let remaining = expires_at.timestamp() - now.timestamp();
        remaining < REFRESH_WINDOW_MINUTES * 60 + CLOCK_SKEW_SECONDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", "stocklet", "stocklet-web")
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_sets_claims() {
        let user_id = Uuid::new_v4();
        let issued = service().issue(user_id, "owner@example.com", issued_at()).unwrap();

        assert_eq!(issued.claims.sub, user_id.to_string());
        assert_eq!(issued.claims.email, "owner@example.com");
        assert_eq!(issued.claims.iss, "stocklet");
        assert_eq!(issued.claims.aud, "stocklet-web");
        assert_eq!(issued.claims.exp - issued.claims.iat, 15 * 60);
    }

    #[test]
    fn test_each_issue_gets_fresh_jti() {
        let svc = service();
        let a = svc.issue(Uuid::new_v4(), "a@example.com", issued_at()).unwrap();
        let b = svc.issue(Uuid::new_v4(), "a@example.com", issued_at()).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn test_accepted_until_expiry_plus_skew() {
        let svc = service();
        let t = issued_at();
        let issued = svc.issue(Uuid::new_v4(), "a@example.com", t).unwrap();

        let last_accepted = t + Duration::minutes(15) + Duration::seconds(60);
        let claims = svc.verify(&issued.token, last_accepted).unwrap();
        assert_eq!(claims, issued.claims);

        let first_rejected = last_accepted + Duration::seconds(1);
        assert!(matches!(
            svc.verify(&issued.token, first_rejected),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_rejects_tampered_signature() {
        let svc = service();
        let issued = svc.issue(Uuid::new_v4(), "a@example.com", issued_at()).unwrap();
        let other = svc.issue(Uuid::new_v4(), "b@example.com", issued_at()).unwrap();

        // Payload of one token under the signature of another.
        let parts: Vec<&str> = issued.token.split('.').collect();
        let other_parts: Vec<&str> = other.token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(matches!(
            svc.verify(&tampered, issued_at()),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_other_secret_and_audience() {
        let issued = service()
            .issue(Uuid::new_v4(), "a@example.com", issued_at())
            .unwrap();

        let other_secret = TokenService::new("other-secret", "stocklet", "stocklet-web");
        assert!(other_secret.verify(&issued.token, issued_at()).is_err());

        let other_audience = TokenService::new("test-secret", "stocklet", "someone-else");
        assert!(other_audience.verify(&issued.token, issued_at()).is_err());

        let other_issuer = TokenService::new("test-secret", "elsewhere", "stocklet-web");
        assert!(other_issuer.verify(&issued.token, issued_at()).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(service().verify("not.a.token", issued_at()).is_err());
    }

    #[test]
    fn test_needs_refresh_window() {
        let svc = service();
        let t = issued_at();
        let issued = svc.issue(Uuid::new_v4(), "a@example.com", t).unwrap();

        let exp = issued.claims.expires_at();

        assert!(!svc.needs_refresh(exp, t));
        assert!(!svc.needs_refresh(exp, t + Duration::minutes(9)));
        assert!(svc.needs_refresh(exp, t + Duration::minutes(9) + Duration::seconds(1)));
        assert!(svc.needs_refresh(exp, t + Duration::minutes(14)));
    }

    #[test]
    fn test_expires_at_matches_exp() {
        let t = issued_at();
        let issued = service().issue(Uuid::new_v4(), "a@example.com", t).unwrap();
        assert_eq!(issued.claims.expires_at(), t + Duration::minutes(15));
    }
}
