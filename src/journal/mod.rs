//! Journal: run provenance and document fingerprints.

pub mod eventlog;
pub mod hasher;
