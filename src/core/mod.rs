//! Core rule compilation
//!
//! Rules flow through these stages, each a pure function of its inputs and the
//! policy configuration:
//!
//! - [`rule`]: Declarations as written, and the validated [`rule::RuleSpec`]
//! - [`address`]: Classifies each trusted network token
//! - [`partition`]: Splits networks into per-family sets
//! - [`identifier`]: Derives the stable ipset identifier of a set
//! - [`expand`]: Fans a rule out into per-family concrete rules and ipsets
//! - [`binder`]: Names the rich rules and builds the custom service
//! - [`catalog`]: Compiles a whole document, plus checksum and diff
//! - [`render`]: Rich-rule listings and `firewall-cmd` scripts
//!
//! Supporting modules: [`policy`] for daemon and zone settings, [`rule_constraints`]
//! for valid field combinations, and [`error`].

pub mod address;
pub mod binder;
pub mod catalog;
pub mod error;
pub mod expand;
pub mod identifier;
pub mod partition;
pub mod policy;
pub mod render;
pub mod rule;
pub mod rule_constraints;

#[cfg(test)]
pub mod test_helpers;
