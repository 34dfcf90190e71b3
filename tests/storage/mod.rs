//! Shared storage integration tests.
//!
//! Tests the RegistrantStore interface contract. Each implementation module
//! imports these test functions and runs them.

pub mod registrant_store_tests;
