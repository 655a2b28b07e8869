//! Process-wide singleton accessor (SPEC_FULL.md §B): most callers build a
//! `Components` explicitly and thread it through, but the debug CLI and
//! the `events` subcommand need a handle to "the running runtime" without
//! plumbing it through every call site. `OnceLock` gives us that without
//! reaching for a `lazy_static`/`once_cell` dependency the teacher doesn't
//! already carry.

use std::sync::OnceLock;

use crate::Components;

static RUNTIME: OnceLock<Components> = OnceLock::new();

/// Installs `components` as the process-wide runtime. Returns the
/// components back to the caller (as an error) if one was already
/// installed — initialization is single-shot per process.
pub fn install(components: Components) -> Result<(), Components> {
    RUNTIME.set(components)
}

/// Borrows the process-wide runtime, if one has been installed.
pub fn get() -> Option<&'static Components> {
    RUNTIME.get()
}
