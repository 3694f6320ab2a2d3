mod handler;
mod model;

pub use handler::{connect, disconnect, get_status};
