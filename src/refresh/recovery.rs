use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::DateRangeKey;

/// 已经尝试过自动恢复的 (client, range) 集合，只在进程生命周期内有效
///
/// 每个键最多一次自动恢复，失败也不再自动重试。
#[derive(Clone, Default)]
pub struct RecoveryMarks {
    marks: Arc<Mutex<HashSet<(Uuid, DateRangeKey)>>>,
}

impl RecoveryMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 原子地占用一个键，返回 false 表示已被占用
    pub fn try_mark(&self, client_id: Uuid, range: &DateRangeKey) -> bool {
        self.marks.lock().insert((client_id, range.clone()))
    }

    /// 显式失效：清除该客户的全部标记
    pub fn clear_client(&self, client_id: Uuid) -> usize {
        let mut marks = self.marks.lock();
        let before = marks.len();
        marks.retain(|(id, _)| *id != client_id);
        before - marks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_marked_once() {
        let marks = RecoveryMarks::new();
        let client = Uuid::new_v4();
        let range = DateRangeKey::parse("30d").unwrap();

        assert!(marks.try_mark(client, &range));
        assert!(!marks.try_mark(client, &range));
        assert!(marks.try_mark(client, &DateRangeKey::parse("7d").unwrap()));
    }

    #[test]
    fn clearing_a_client_leaves_others() {
        let marks = RecoveryMarks::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let range = DateRangeKey::parse("30d").unwrap();
        marks.try_mark(a, &range);
        marks.try_mark(b, &range);

        assert_eq!(marks.clear_client(a), 1);
        assert!(marks.try_mark(a, &range));
        assert!(!marks.try_mark(b, &range));
    }
}
