//! Application-level orchestration.
//!
//! `ListController` binds one list page to the cache, the status workflow and the printer;
//! `run_controller` feeds it commands from the TUI. CLI modes call the controller directly.

mod controller;
mod list;

pub use controller::{run_controller, UiCommand};
pub use list::{ActionError, Confirmation, ListController};
