//! Unit tests for argument parsing and configuration resolution.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod parse;
