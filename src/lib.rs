pub mod animation;
pub mod app;
pub mod builder;
pub mod canvas;
pub mod cli;
pub mod config;
pub mod error;
pub mod expand_state;
pub mod layout;
pub mod render;
pub mod source;
pub mod tree;
