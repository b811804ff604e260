pub mod app_command;

pub use app_command::{help_text, AppCommand, DEFAULT_PAGE_SIZE};
