//! Application-level orchestration utilities.
//!
//! This module owns the four dashboard controllers, turns UI commands into runs, and handles
//! post-commit processing such as exports. UI/CLI layers call into this module to keep
//! responsibilities separated.

#[cfg(feature = "tui")]
mod controller;
mod dashboards;
mod post_process;

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand, UiEvent};
pub(crate) use dashboards::{Dashboards, RequestParams};
pub(crate) use post_process::process_update;
#[cfg(feature = "tui")]
pub(crate) use post_process::save_result;
