use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: String, // User ID (Subject)
    pub email: Option<String>,
    pub exp: usize, // Expiration time (UNIX timestamp)
}

#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: String,
    pub claims: UserClaims,
}

/// Who is calling. Inserted into every guarded request by the auth middleware.
#[derive(Clone, Debug)]
pub enum Caller {
    /// No token was presented and none was required.
    Anonymous,
    /// A verified bearer token.
    User(UserContext),
}

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(ctx) => Some(&ctx.user_id),
        }
    }
}
