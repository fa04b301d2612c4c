//! Bearer-token authentication.

pub mod claims;
pub mod middleware;

pub use claims::{Caller, UserClaims, UserContext};
pub use middleware::{Authenticator, auth_middleware};
