//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the booking rules and every conversation with the
//! booking backend, so route handlers stay focused on extracting input,
//! session cookies and error-to-status mapping.

pub mod account;
pub mod auth_fetch;
pub mod backend;
pub mod booking;
pub mod gallery;
pub mod session;
pub mod upload;
