pub mod builder;
pub mod composer;
pub mod content;
pub mod editor;
pub mod export;
pub mod grammar;
pub mod letter;
pub mod persist;
pub mod text;
pub mod timeline;
