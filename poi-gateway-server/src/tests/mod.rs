//! Shared test harness modules for the gateway CLI and HTTP surface.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod helpers;
mod routes_unit;
