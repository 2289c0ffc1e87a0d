pub mod conversation;
pub mod engagement;
pub mod keys;
pub mod message;
pub mod session;
