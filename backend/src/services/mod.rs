//! Module for collaborators outside the request path, such as outbound email.

pub mod email_service;
