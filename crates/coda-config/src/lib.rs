// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
mod loader;
mod schema;

pub use loader::{load, load_from};
pub use schema::*;
