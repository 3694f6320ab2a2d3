use uuid::Uuid;

use crate::models::{DataKind, DateRangeKey};

/// 快照缓存键前缀
const SNAPSHOT_PREFIX: &str = "snapshot:";

/// 快照缓存代数键前缀
const GENERATION_PREFIX: &str = "generation:";

/// 生成快照缓存键，每个 (client, kind) 一个 HASH
pub fn snapshot_key(client_id: Uuid, kind: DataKind) -> String {
    format!("{}{}:{}", SNAPSHOT_PREFIX, client_id, kind)
}

/// 快照 HASH 的失效代数，每次失效时加一
pub fn snapshot_generation_key(snapshot_key: &str) -> String {
    format!("{}{}", GENERATION_PREFIX, snapshot_key)
}

/// HASH 内的字段，按时间范围和条数区分
pub fn snapshot_field(range: &DateRangeKey, limit: usize) -> String {
    format!("{}:{}", range, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_group_ranges_under_one_hash() {
        let client = Uuid::nil();
        assert_eq!(
            snapshot_key(client, DataKind::Backlinks),
            "snapshot:00000000-0000-0000-0000-000000000000:backlinks"
        );
        let range = DateRangeKey::parse("30d").unwrap();
        assert_eq!(snapshot_field(&range, 2), "30d:2");
        assert_eq!(
            snapshot_generation_key("snapshot:abc:backlinks"),
            "generation:snapshot:abc:backlinks"
        );
    }
}
