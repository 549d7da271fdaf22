//! Scriptorium: a small blog engine serving Markdown entries under canonical
//! slugs, with tag pages, paginated listings and feeds.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
