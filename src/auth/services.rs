pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::dto::{ChangePasswordRequest, RegisterRequest, UpdateProfileRequest};
use crate::config::JwtConfig;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9]{3,30}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Registration fields after trimming and format checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub postal_code: Option<String>,
}

/// Profile fields to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

fn trimmed(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|v| !v.is_empty())
}

fn full_name(v: &str) -> Result<String, String> {
    match v.trim() {
        "" => Err("Full name is required".into()),
        v if v.chars().count() > 255 => Err("Full name is too long".into()),
        v => Ok(v.to_string()),
    }
}

fn username(v: &str) -> Result<String, String> {
    let v = v.trim();
    if !USERNAME_RE.is_match(v) {
        return Err("Username must be 3-30 letters or digits".into());
    }
    Ok(v.to_string())
}

fn email(v: &str) -> Result<String, String> {
    let v = v.trim().to_lowercase();
    if !is_valid_email(&v) {
        return Err("Invalid email".into());
    }
    Ok(v)
}

fn phone(v: &str) -> Result<String, String> {
    let compact: String = v.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !PHONE_RE.is_match(&compact) {
        return Err("Invalid phone number".into());
    }
    Ok(compact)
}

pub fn validate_registration(req: &RegisterRequest) -> Result<Registration, String> {
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password too short".into());
    }
    let postal_code = match trimmed(req.postal_code.as_deref()) {
        Some(p) if p.chars().count() > 20 => return Err("Postal code is too long".into()),
        p => p.map(str::to_string),
    };
    Ok(Registration {
        full_name: full_name(&req.full_name)?,
        username: username(&req.username)?,
        email: email(&req.email)?,
        phone_number: trimmed(req.phone_number.as_deref()).map(phone).transpose()?,
        postal_code,
    })
}

pub fn validate_profile_update(req: &UpdateProfileRequest) -> Result<ProfileChanges, String> {
    let profile_picture = match trimmed(req.profile_picture.as_deref()) {
        Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => {
            return Err("Profile picture must be an http(s) URL".into())
        }
        url => url.map(str::to_string),
    };
    Ok(ProfileChanges {
        full_name: trimmed(req.full_name.as_deref()).map(full_name).transpose()?,
        username: trimmed(req.username.as_deref()).map(username).transpose()?,
        email: trimmed(req.email.as_deref()).map(email).transpose()?,
        phone_number: trimmed(req.phone_number.as_deref()).map(phone).transpose()?,
        profile_picture,
    })
}

/// Current and new password of a change request, in that order.
pub fn validate_password_change(req: &ChangePasswordRequest) -> Result<(&str, &str), String> {
    let (Some(current), Some(new)) = (
        req.current_password.as_deref().filter(|p| !p.is_empty()),
        req.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err("Current and new password are required".into());
    };
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password too short".into());
    }
    Ok((current, new))
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }

    fn sign(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

/// Client-facing reason for a token that failed verification.
fn token_rejection(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<jsonwebtoken::errors::Error>().map(|e| e.kind()) {
        Some(ErrorKind::ExpiredSignature) => "Token expired, please log in again",
        _ => "Invalid token",
    }
}

/// Id of the caller, taken from a `Bearer` access token.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = |msg: &str| (StatusCode::UNAUTHORIZED, msg.to_string());

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization header"))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            unauthorized(token_rejection(&e))
        })?;

        if claims.kind != TokenKind::Access {
            return Err(unauthorized("Access token required"));
        }
        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3P@ssw0rd!").expect("hashing should succeed");
        assert!(verify_password("Secur3P@ssw0rd!", &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }
}


#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    #[tokio::test]
    async fn access_token_roundtrip() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let claims = keys
            .verify(&keys.sign_access(user_id).expect("sign access"))
            .expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn refresh_only_accepts_refresh_tokens() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let claims = keys
            .verify_refresh(&keys.sign_refresh(user_id).expect("sign refresh"))
            .expect("verify refresh");
        assert_eq!(claims.sub, user_id);

        let access = keys.sign_access(user_id).expect("sign access");
        let err = keys.verify_refresh(&access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[tokio::test]
    async fn verify_rejects_foreign_issuer_audience_or_secret() {
        let token = make_keys().sign_access(Uuid::new_v4()).expect("sign access");
        let base = AppState::fake().config.jwt.clone();

        let mut cfg = base.clone();
        cfg.issuer = "someone-else".into();
        assert!(JwtKeys::from_config(&cfg).verify(&token).is_err());

        let mut cfg = base.clone();
        cfg.audience = "other-aud".into();
        assert!(JwtKeys::from_config(&cfg).verify(&token).is_err());

        let mut cfg = base;
        cfg.secret = "another-secret".into();
        let err = JwtKeys::from_config(&cfg).verify(&token).unwrap_err();
        assert_eq!(token_rejection(&err), "Invalid token");
    }

    #[tokio::test]
    async fn expired_tokens_get_their_own_message() {
        let mut cfg = AppState::fake().config.jwt.clone();
        cfg.ttl_minutes = 0;
        let keys = JwtKeys::from_config(&cfg);
        // back-date by more than the default 60s leeway
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: 0,
            exp: (OffsetDateTime::now_utc().unix_timestamp() - 600) as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        let err = keys.verify(&token).unwrap_err();
        assert_eq!(token_rejection(&err), "Token expired, please log in again");
    }
}
