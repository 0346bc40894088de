//! Scanner collaborators.
//!
//! Each wrapper owns one tool's invocation and normalizes its native
//! output into [`remedian_core::Finding`] at this boundary. The core
//! consumes the normalized shape only.

pub mod exploit;
pub mod nmap;
pub mod npm_audit;
pub mod osv;
pub mod process;
