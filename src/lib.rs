//! Inkfeed - a small social blogging site
//!
//! Users publish posts, file them under groups, comment on them and follow
//! other authors to get a personal feed.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
