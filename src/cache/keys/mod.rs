/// 缓存键模块

pub mod rate_limit_keys;
pub mod snapshot_keys;

pub use rate_limit_keys::rate_limit_key;
pub use snapshot_keys::{snapshot_field, snapshot_generation_key, snapshot_key};
