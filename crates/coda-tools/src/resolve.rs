// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! Working-directory-relative path resolution used by the file tools.

use std::path::{Path, PathBuf};

/// Resolve `file_path` against `working_dir`.
///
/// - An absolute path is canonicalized when possible and returned as-is
///   otherwise; the result is always absolute.
/// - A relative path is joined onto `working_dir`, then canonicalized when
///   possible.  When canonicalization fails (the file may not exist yet, as
///   for a Write that creates it) the joined form is returned unchanged.
pub fn resolve_path(working_dir: &Path, file_path: &str) -> PathBuf {
    let p = Path::new(file_path);
    let joined = if p.is_absolute() {
        p.to_path_buf()
    } else {
        working_dir.join(p)
    };
    joined.canonicalize().unwrap_or(joined)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
