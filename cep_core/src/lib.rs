//! Tree-based complex event processing evaluation core.
//!
//! An [`eval::EvaluationMechanism`] is built from a set of registered
//! [`pattern::Pattern`]s and an [`config::EngineConfig`]; feeding it events
//! one at a time via `eval_event` drives one or more [`tree::Tree`]s (one
//! per merged pattern group, see [`merge`]) and returns every full match
//! completed along the way. `io` supplies a runnable reference input/output
//! boundary so the crate works end to end without an external adapter.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::clone_on_ref_ptr
)]

pub mod config;
pub mod errors;
pub mod eval;
pub mod event;
pub mod io;
pub mod merge;
pub mod metrics;
pub mod node;
pub mod optimizer;
pub mod partial_match;
pub mod pattern;
pub mod plan;
pub mod preprocess;
pub mod shed;
pub mod stats;
pub mod storage;
pub mod tree;
