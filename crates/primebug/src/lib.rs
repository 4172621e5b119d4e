//! PrimeBug - a multi-tenant bug tracker.
//!
//! Teams own projects, projects own bugs, and every bug carries a
//! human-readable ticket number issued from a per-project counter. The
//! crate provides both the service layer and the `primebug` CLI built on
//! top of it.
//!
//! Documents live in a [`primebug_docstore`] store, attachments in a
//! [`blob::BlobStore`]. Both are assembled once into a
//! [`services::Backend`] that every service call takes by reference.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod blob;
pub mod config;
pub mod domain;
pub mod error;
pub mod id_generation;
pub mod services;

// Public CLI module (needed by binary)
pub mod app;
pub mod cli;
pub mod output;

// Command implementations
pub mod commands;

pub use error::{Error, Result};
