// 数据库操作实现

pub mod connection;
pub mod snapshot;
pub mod throttle;

pub use connection::PgConnectionStore;
pub use snapshot::PgSnapshotStore;
pub use throttle::PgThrottleStore;
