//! Small helpers for running external tools and handling paths.

pub mod exec;
pub mod paths;

pub use exec::{CommandSpec, exec, is_gnu_tar};
pub use paths::{clean_path, expand_home, mkdir_p};
