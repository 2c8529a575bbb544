use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{ready, Ready};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{Id, User};
use crate::repo::RepoError;
use crate::routes::AppState;

/// Permission levels, totally ordered `User < Moderator < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Position in the role hierarchy.
    pub const fn rank(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "MODERATOR" => Ok(Role::Moderator),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("invalid role {other:?}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// True when `role` is at least `required` in the hierarchy.
pub fn has_role(role: Role, required: Role) -> bool {
    role.rank() >= required.rank()
}

/// Session claims. Only the user id is carried; the role is looked up per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<Id> {
        self.sub.parse().ok()
    }
}

pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Issue a session token for `user_id`. `ttl_hours` is clamped to 1..=MAX_JWT_TTL_HOURS.
pub fn create_jwt(secret: &str, user_id: Id, ttl_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let ttl_hours = ttl_hours.clamp(1, crate::config::MAX_JWT_TTL_HOURS);
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(ttl_hours))
        .unwrap_or_else(chrono::Utc::now)
        .timestamp() as usize;

    let claims = Claims { sub: user_id.to_string(), exp: expiration };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            log::error!("auth extractor: AppState not registered");
            return ready(Err(ApiError::Internal));
        };
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return match decode_jwt(&state.config.jwt_secret, bearer.token()) {
                Ok(claims) => ready(Ok(Auth(claims))),
                Err(e) => {
                    log::debug!("rejected bearer token: {e}");
                    ready(Err(ApiError::Unauthorized))
                }
            };
        }
        ready(Err(ApiError::Unauthorized))
    }
}

/// The authenticated caller, with the role as currently stored.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: Id,
    pub role: Role,
}

impl From<&User> for Caller {
    fn from(u: &User) -> Self {
        Self { id: u.id, role: u.role }
    }
}

/// Resolve the session to a live user record. Fails with `Unauthorized` when the
/// token's subject is malformed or the user no longer exists.
pub async fn require_auth(state: &AppState, auth: &Auth) -> Result<Caller, ApiError> {
    let id = auth.0.user_id().ok_or(ApiError::Unauthorized)?;
    match state.repo.get_user(id).await {
        Ok(user) => Ok(Caller::from(&user)),
        Err(RepoError::NotFound) => Err(ApiError::Unauthorized),
        Err(e) => {
            log::error!("require_auth: loading user {id} failed: {e}");
            Err(ApiError::Internal)
        }
    }
}

/// `require_auth` followed by a hierarchy check against `required`.
pub async fn require_role(state: &AppState, auth: &Auth, required: Role) -> Result<Caller, ApiError> {
    let caller = require_auth(state, auth).await?;
    if !has_role(caller.role, required) {
        return Err(ApiError::Forbidden);
    }
    Ok(caller)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_is_total() {
        assert!(has_role(Role::Admin, Role::User));
        assert!(has_role(Role::Admin, Role::Moderator));
        assert!(has_role(Role::Moderator, Role::User));
        assert!(!has_role(Role::User, Role::Moderator));
        assert!(!has_role(Role::Moderator, Role::Admin));
        for r in [Role::User, Role::Moderator, Role::Admin] {
            assert!(has_role(r, r));
        }
    }

    #[test]
    fn role_parses_uppercase_only() {
        assert_eq!("MODERATOR".parse::<Role>().unwrap(), Role::Moderator);
        assert!("moderator".parse::<Role>().is_err());
        assert!("ROOT".parse::<Role>().is_err());
    }

    #[test]
    fn jwt_roundtrip_keeps_subject() {
        let secret = "unit-test-secret-that-is-32-bytes!!";
        let token = create_jwt(secret, 42, 1).unwrap();
        let claims = decode_jwt(secret, &token).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert!(decode_jwt("another-secret-another-secret-0000", &token).is_err());
    }

    #[test]
    fn secret_comparison() {
        assert!(secrets_match("front-end-secret", "front-end-secret"));
        assert!(!secrets_match("front-end-secreT", "front-end-secret"));
        assert!(!secrets_match("", "front-end-secret"));
    }

    #[test]
    fn out_of_range_ttl_is_clamped_not_fatal() {
        let secret = "unit-test-secret-that-is-32-bytes!!";
        let far = decode_jwt(secret, &create_jwt(secret, 7, i64::MAX).unwrap()).unwrap();
        let limit = chrono::Utc::now() + chrono::Duration::hours(crate::config::MAX_JWT_TTL_HOURS + 1);
        assert!((far.exp as i64) < limit.timestamp());

        // a non-positive ttl still yields a token valid for the minimum hour
        let near = decode_jwt(secret, &create_jwt(secret, 7, -5).unwrap()).unwrap();
        assert_eq!(near.user_id(), Some(7));
    }
}
