pub mod bookmarks;
pub mod browser;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod fetch;
pub mod github;
pub mod notify;
pub mod output;
pub mod scheduler;
pub mod state;
