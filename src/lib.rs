/// Inventory Media - media upload consistency engine
///
/// Accepts item images and group logos, stores their artifacts in an object
/// store and registers them in relational metadata, keeping the two
/// consistent across partial failures.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod media;
pub mod metadata;
pub mod object_store;
pub mod permissions;
pub mod server;
