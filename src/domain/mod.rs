pub mod cache;
pub mod chain;
pub mod clock;
pub mod config;
pub mod content;
pub mod yaml_config;
