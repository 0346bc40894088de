//! remedian CLI internals.
//!
//! The binary in `main.rs` is a thin dispatcher; everything it calls
//! lives here so integration tests can exercise the collaborators
//! directly.

pub mod commands;
pub mod demo;
pub mod git;
pub mod github;
pub mod publisher;
pub mod render;
pub mod scanners;
