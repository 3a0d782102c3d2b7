//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the user id (`sub`), the platform role and
//! an expiry. Issuing tokens belongs to the identity service; this module only
//! verifies them and turns the claims into a [`Requester`].
use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use cra_core::{Requester, Role};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Expiry as seconds since the epoch.
    pub exp: usize,
}

impl Claims {
    pub fn requester(&self) -> Requester {
        Requester::new(self.sub, self.role)
    }
}

/// HS256 key pair derived from the shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                ApiError::Unauthorized
            })
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Requester);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized)?;
        let claims = state.token_keys().verify(bearer.token())?;
        Ok(AuthUser(claims.requester()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            sub: Uuid::now_v7(),
            role: Role::Researcher,
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = TokenKeys::new("secret");
        let claims = claims(3600);
        let token = keys.issue(&claims).unwrap();
        let verified = keys.verify(&token).unwrap();
        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.role, Role::Researcher);
    }

    #[test]
    fn wrong_secret_and_expiry_are_rejected() {
        let token = TokenKeys::new("secret").issue(&claims(3600)).unwrap();
        assert!(matches!(
            TokenKeys::new("other").verify(&token),
            Err(ApiError::Unauthorized)
        ));

        let keys = TokenKeys::new("secret");
        let stale = keys.issue(&claims(-3600)).unwrap();
        assert!(matches!(keys.verify(&stale), Err(ApiError::Unauthorized)));
    }
}
