//! Core engine for vendorscope.
//!
//! Relocates the namespaces, global types and global constants of a set of
//! Composer packages under a private prefix, so a bundled copy of a library
//! cannot collide with another copy loaded by someone else.
//!
//! The engine works on text. [`rule`] provides guarded regex rewrites,
//! [`relocate`] builds the three relocators on top of them, and the remaining
//! modules supply what they run against: package discovery ([`manifest`],
//! [`resolve`]), configuration ([`config`]), copying ([`copier`]), fact
//! harvesting ([`facts`]) and the generated autoloader ([`autoload`]).

pub mod autoload;
pub mod builtins;
pub mod config;
pub mod copier;
pub mod error;
pub mod facts;
pub mod manifest;
pub mod output;
pub mod relocate;
pub mod resolve;
pub mod rule;
pub mod syntax;

pub use error::{OutputErrorCode, ScopeError};
