pub mod auth;
pub mod participant;
