//! Tests for the executor
//!
//! Organized by feature area

mod await_tests;
mod basic_tests;
mod external_call_tests;
mod helpers;
mod stdlib_tests;
