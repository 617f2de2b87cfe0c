/// Shared helpers for external commands, polling and templating
pub mod command;
pub mod polling;
pub mod template;
