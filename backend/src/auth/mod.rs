//! Authentication module for managing accounts, sessions, and access control.
//!
//! This module provides login, registration, password recovery, cookie-based
//! session management with silent refresh, lockout, token revocation and the
//! audit trail.

pub mod audit;
pub mod blacklist;
pub mod cookies;
pub mod handlers;
pub mod lockout;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod state;
