use crate::AppState;
use crate::error::RelayError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use super::claims::{Caller, UserClaims, UserContext};

/// Verifies HS256 bearer tokens. Built once at startup.
#[derive(Clone)]
pub struct Authenticator {
    key: DecodingKey,
    validation: Validation,
    required: bool,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(secret: &str, required: bool) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            required,
        }
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// A presented bearer token is always verified, even when tokens are
    /// optional.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Caller, RelayError> {
        let Some(token) = authorization.and_then(bearer_token) else {
            if self.required {
                return Err(RelayError::Unauthorized);
            }
            return Ok(Caller::Anonymous);
        };

        match decode::<UserClaims>(token.trim(), &self.key, &self.validation) {
            Ok(token_data) => {
                let claims = token_data.claims;
                tracing::debug!(
                    name: "auth.token.verified",
                    user_id = %claims.sub,
                    email = ?claims.email,
                    "Bearer token verified"
                );
                Ok(Caller::User(UserContext {
                    user_id: claims.sub.clone(),
                    claims,
                }))
            }
            Err(e) => {
                tracing::debug!(name: "auth.token.rejected", error = %e, "Bearer token rejected");
                Err(RelayError::Unauthorized)
            }
        }
    }
}

/// Token of a `Bearer` credential. The scheme name is case-insensitive.
fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim_start().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RelayError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let caller = state.auth.authenticate(auth_header)?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
