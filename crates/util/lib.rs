//! Shared utilities for the storage node core: error taxonomy, configuration,
//! the object/metadata data model, time helpers and the background worker
//! runtime used by every other crate in the workspace.

#[macro_use]
extern crate tracing;

pub mod background;
pub mod config;
pub mod data;
pub mod error;
pub mod time;
