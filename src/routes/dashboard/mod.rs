mod handler;
mod model;

pub use handler::{force_refresh, get_dashboard};
