//! packs - install skills, agents and hooks from pack repositories into a
//! workspace, tracked by a versioned registry document.

pub mod app;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod lifecycle;
pub mod manifest;
pub mod registry;
pub mod stacks;
pub mod storage;

pub use error::{PackError, Result};
