//! Abandonship - send a Pushover notification using credentials kept in
//! Google Cloud Secret Manager.
//!
//! The binary is a thin wrapper around [`pipeline::run`], which is generic
//! over the three external collaborators so it can be exercised without a
//! network.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod notify;
pub mod pipeline;
pub mod secret_store;

#[cfg(test)]
pub(crate) mod test_support;
