//! `salondesk-auth` — authentication boundary for the till service.
//!
//! This crate is intentionally decoupled from HTTP and storage: it models the
//! claims carried by a staff token and verifies HS256 signatures. The HTTP
//! layer turns a validated token into a request-scoped staff context.

pub mod claims;
pub mod jwt;
pub mod roles;

pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use roles::Role;
