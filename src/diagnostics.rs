//! Operator-facing diagnostics written to stderr, independent of whatever
//! `Result` the caller inspects.
//!
//! The original C core prints directly to `stderr` via `EPRINTF*` macros
//! so that a failure is visible even if a caller ignores the return value.
//! This module reproduces that contract: every line starts with
//! `hashindex:`, and a path-carrying failure is `hashindex: <path>: ...`.
//! System errors append `(<os error>)` the way `EPRINTF` appends
//! `strerror(errno)`.
use std::path::Path;

use crate::error::HashIndexError;

/// Writes the diagnostic line for `err` to stderr, matching spec.md's
/// `hashindex:` / `hashindex: <path>:` prefix contract.
pub fn report(err: &HashIndexError) {
    match err {
        HashIndexError::Io { path, source } => {
            eprintln!("hashindex: {}: {} ({})", path.display(), io_context(err), source);
        }
        HashIndexError::InvalidMagic { path } => {
            eprintln!("hashindex: {}: unknown MAGIC in header", path.display());
        }
        HashIndexError::LengthMismatch {
            path,
            expected,
            actual,
        } => {
            eprintln!(
                "hashindex: {}: incorrect file length (expected {}, got {})",
                path.display(),
                expected,
                actual
            );
        }
        other => {
            eprintln!("hashindex: {}", other);
        }
    }
}

/// Short operation label for an I/O failure, inferred the same way the C
/// core names the failing libc call (`fopen`, `fread`, `fwrite`, ...).
fn io_context(err: &HashIndexError) -> &'static str {
    match err {
        HashIndexError::Io { .. } => "I/O failure",
        _ => "failure",
    }
}

/// Writes a path-scoped message with no associated error, for situations
/// the C core logs with `EPRINTF_MSG_PATH` but that aren't represented as a
/// `HashIndexError` (e.g. informational notices during load).
pub fn note_path(path: &Path, msg: &str) {
    eprintln!("hashindex: {}: {}", path.display(), msg);
}
