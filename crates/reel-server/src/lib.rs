//! # Reel Server Library
//!
//! Wires the scheduler actor to its in-process collaborators and provides
//! the startup helpers used by the `reel-server` binary.

pub mod app;
pub mod startup;
