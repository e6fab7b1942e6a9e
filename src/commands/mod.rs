// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations for the diffrag binary

pub mod analyze;
pub mod history;
pub mod index;
pub mod pattern;
pub mod search;

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;

/// Reads a file, or stdin when `source` is "-".
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))
    }
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
