//! Utility functions and helpers.

pub mod checksum;
pub mod http;

pub use checksum::checksum;
