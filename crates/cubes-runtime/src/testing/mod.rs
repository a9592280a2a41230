//! Test doubles for code that drives a sync run.

mod mock_target;

pub use mock_target::{MockColumn, MockTable, MockTarget};
