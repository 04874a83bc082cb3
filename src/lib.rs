//! vendorscope: relocate PHP dependencies under a private namespace prefix.
//!
//! The engine lives in `vendorscope-core` and is re-exported here; this crate
//! adds the run orchestration in [`pipeline`] and the `vendorscope` binary.

pub use vendorscope_core::autoload;
pub use vendorscope_core::builtins;
pub use vendorscope_core::config;
pub use vendorscope_core::copier;
pub use vendorscope_core::error;
pub use vendorscope_core::facts;
pub use vendorscope_core::manifest;
pub use vendorscope_core::output;
pub use vendorscope_core::relocate;
pub use vendorscope_core::resolve;
pub use vendorscope_core::rule;
pub use vendorscope_core::syntax;

pub mod pipeline;

pub use pipeline::{Prefixer, RunPlan};
