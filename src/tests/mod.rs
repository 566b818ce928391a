//! Crate-level tests that run the server and client together.

mod integration;
