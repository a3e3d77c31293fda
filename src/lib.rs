//! cweprobe - probe-and-measure engine for CWE susceptibility studies
//!
//! Drives an AI-assisted editor session through repeated rounds of
//! restructure-then-implement instructions against a fixed set of target
//! functions, scans each implementation with external static analyzers, and
//! tracks per-function outcomes across rounds in a resumable statistics table.
//!
//! The engine never automates an editor itself; it talks to the session
//! through the [`driver::InteractionDriver`] seam, so any scriptable frontend
//! can be driven.

pub mod completion;
pub mod config;
pub mod context;
pub mod domain;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod scan;
pub mod stats;
pub mod storage;

pub use domain::*;
