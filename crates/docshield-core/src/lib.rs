// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocShield: core types, error definitions, and editor configuration shared
// across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::EditorConfig;
pub use error::DocShieldError;
pub use types::*;
