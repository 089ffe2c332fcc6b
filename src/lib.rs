//! Austen Storyteller — templated Regency-style story composition.
//!
//! Assembles narrative prose from weighted template fragments driven by a
//! theme, a style, a setting and a cast of characters, then lets callers
//! edit the result and persist it as TXT, JSON or HTML.

pub mod config;
pub mod core;
pub mod schema;
