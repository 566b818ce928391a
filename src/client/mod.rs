//! Client side of the JSON API: builds read/write calls, signs them the same
//! way the server verifies them, and decodes typed responses.

pub mod request;

pub use request::{decode_response, Request};
