use chrono::{DateTime, Utc};
use serde::Serialize;

/// (client, provider) 的连接记录
///
/// `believed_valid` 为真时 `has_credential` 必为真，存储层负责保证。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionRecord {
    pub has_credential: bool,
    pub believed_valid: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub account_label: Option<String>,
}

impl ConnectionRecord {
    /// 有凭证但已被判定失效，需要用户重新连接
    pub fn needs_reconnect(&self) -> bool {
        self.has_credential && !self.believed_valid
    }
}

/// 轻量探测调用返回的账号信息
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeIdentity {
    pub account_label: Option<String>,
}
