//! CLI module for backr - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
