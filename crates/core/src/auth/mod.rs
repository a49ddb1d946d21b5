//! Authentication and authorization primitives

pub mod context;
pub mod password;
pub mod roles;
pub mod token;

pub use context::AuthContext;
pub use roles::Role;
pub use token::{Claims, TokenError, TokenManager};
