//! Error plumbing shared by the calmcp crates.

pub mod context;

pub use context::FromMessage;
