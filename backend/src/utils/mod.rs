//! Collection of general utility functions.
//!
//! Token signing, password hashing, and random code generation used by the
//! authentication flows.

pub mod generate_random_string;
pub mod jwt;
pub mod password;
