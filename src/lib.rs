//! ash: guided recipe runner.
//!
//! Normalizes recipe documents across schema versions, then walks the user
//! through them one step at a time: prompts, capability injection,
//! retry/skip/abort, and a JSONL run journal.

pub mod cli;
pub mod core;
pub mod journal;
pub mod script;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
