//! Cinema Collab: colleague finder bot for film-industry professionals.

pub mod catalog;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod render;
pub mod routes;
pub mod store;
