pub mod config;
pub mod issue;
pub mod store;
pub mod tdq;
pub mod tui;
