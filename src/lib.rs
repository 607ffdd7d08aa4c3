// src/lib.rs

//! hub-scout: polling client for a content hub.
//!
//! Pulls feed and post jobs from the hub, checks RSS feeds and scrapes pages
//! with XPath or CSS selectors, and reports new links and page versions back.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
