pub mod auth;
pub mod guards;

pub use auth::{auth_middleware, verify_token, AuthUser, Claims};
pub use guards::CurrentUser;
