//! Courier messaging server: two-party conversations, message lifecycle,
//! reactions and stars, and the public half of end-to-end encryption
//! (key directory and ratchet session bookkeeping).

pub mod clock;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fingerprint;
pub mod handlers;
pub mod jwt;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod router;
pub mod services;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod tasks;
pub mod validation;
