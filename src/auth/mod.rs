//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - The OAuth callback that exchanges an authorization code for a session
//! - Session token (JWT) minting and validation
//! - Session snapshot and sign-out endpoints
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;
