//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Local signup/login with Argon2 password hashes
//! - GitHub and Google OAuth with identity reconciliation
//! - JWT token generation and validation
//! - Session gate middleware and `Principal` extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod password;
pub mod reconcile;
pub mod reset;
pub mod routes;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use routes::auth_routes;
