//! Core engine: recipe model, normalization, injection and execution.

pub mod capability;
pub mod context;
pub mod dialog;
pub mod error;
pub mod executor;
pub mod function;
pub mod injector;
pub mod normalizer;
pub mod settings;
pub mod types;
pub mod verify;
