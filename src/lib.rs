pub mod application;
pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod error;
pub mod package;
pub mod packaging;
pub mod registry;
pub mod runtime;
pub mod staging;
