// ============================
// crates/core-lib/src/auth/mod.rs
// ============================
//! Credential manager: password hashing, verification and token checks.

pub mod password;
pub mod tokens;
mod service;
mod service_impl;

pub use password::{
    check_password_policy, verify_password, verify_password_offloaded, Credentials, HashCost,
    MAX_PASSWORD_BYTES, MIN_PASSWORD_LENGTH,
};
pub use tokens::{authenticate, authenticate_remember, reset_expired};
pub use service::AuthService;
pub use service_impl::DefaultAuth;
