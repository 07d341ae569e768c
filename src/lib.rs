//! simpfw - firewalld rule compiler
//!
//! Compiles declarative access rules (title, protocol, trusted networks, ports) into
//! the firewalld resources that enforce them: ipsets, custom services, and rich
//! rules in a default-deny zone.
//!
//! # Architecture
//!
//! - [`core`] - Address classification, expansion, binding, and catalog compilation
//! - [`validators`] - Input validation and sanitization
//! - [`config`] - Site policy defaults and persistence
//! - [`utils`] - Utility functions (XDG directories, atomic output)
//!
//! # Guarantees
//!
//! - Ipset names depend only on set membership, never on declaration order
//! - A document compiles completely or not at all
//! - Hostnames in trusted networks are reported, never silently trusted

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use config::PolicyConfig;
pub use core::catalog::{Catalog, parse_rules};
pub use core::error::{Error, Result};
pub use core::rule::{Action, ApplyTo, Protocol, RuleDecl, RuleSpec};
