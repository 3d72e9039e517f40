//! HTTP routes

pub mod analysis;
pub mod detect;
pub mod health;
