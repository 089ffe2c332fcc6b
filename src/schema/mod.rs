pub mod character;
pub mod setting;
pub mod story;
