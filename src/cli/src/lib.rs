//! d2w CLI - convert container images into WSL distributions.

pub mod commands;
pub mod output;
