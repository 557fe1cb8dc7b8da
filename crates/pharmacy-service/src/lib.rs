//! Pharmacy storefront HTTP API service.
//!
//! This crate provides the HTTP API for the storefront:
//!
//! - Accounts, staff roles and the cash balance
//! - Catalog goods, promotions and reviews
//! - Loyalty card administration
//! - Purchases, their lines, and checkout
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **HS256 JWT bearer tokens** - For end-user requests. The `sub` claim
//!    is the user ID.
//! 2. **Admin API key** - For balance credits and role assignment.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router even when the store is sync

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
