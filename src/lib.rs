pub mod api;
pub mod app_service;
pub mod app_state;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod drafts;
pub mod live;

pub use app_state::AppEvent;
pub use config::AppConfig;
