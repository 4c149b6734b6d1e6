//! API handlers module

pub mod auth;
pub mod conversations;
pub mod documents;
pub mod health;
pub mod learning;
pub mod memories;
pub mod search;
pub mod tags;
pub mod users;
