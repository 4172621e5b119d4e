//! Workspace-level commands that run before a backend exists.

pub mod init;
