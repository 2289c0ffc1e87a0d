//! Courier shared library: ids, errors, constants and the HTTP API contract
//! shared between the messaging server and its clients.

pub mod api;
pub mod constants;
pub mod error;
pub mod ids;
