pub mod cli;
pub mod commands;
pub mod config;
pub mod editor;
pub mod load_config;
pub mod select;

pub use cli::{run, Cli, Commands};
