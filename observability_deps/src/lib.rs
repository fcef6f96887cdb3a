//! Reexports for common observability crates, to help coordinate versions and
//! provide a vetted, single source of truth for crates that use `tracing`.
//!
//! Depend on this crate rather than directly on `tracing` so that an
//! upgrade of the tracing ecosystem happens in one place.

pub use tracing;
