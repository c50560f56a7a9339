pub mod app;
pub mod autofill;
pub mod board;
pub mod drag;
pub mod editor;
pub mod effects;
pub mod form;
pub mod hit;
pub mod keymap;
pub mod layout;
pub mod lines;
pub mod modal;
pub mod runtime;
pub mod scroll;
pub mod ui;
pub mod update;

pub use runtime::run_tui;
