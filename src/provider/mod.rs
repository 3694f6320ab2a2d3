//! 外部数据提供方客户端
//!
//! 每个客户端只负责一次逻辑请求，本身不持有状态。节流、缓存、连接
//! 状态都由 `refresh` 模块处理。

pub mod analytics;
mod http;
pub mod seo;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{DataKind, DateRangeKey, ProbeIdentity, ProviderKind, SnapshotPayload};

pub use analytics::AnalyticsHttpClient;
pub use seo::SeoHttpClient;
pub use stub::StubProvider;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// 提供方拒绝了保存的凭证，连接需要降级
    #[error("provider rejected the stored credential; reconnect required")]
    CredentialInvalid,
    /// 网络错误、超时或 5xx，属于暂时性故障
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// 调用成功但数据结构不完整
    #[error("provider returned incomplete data (missing {0})")]
    PartialData(String),
}

/// 一次数据拉取请求，字段全部为自有类型以便放进独立任务
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub client_id: Uuid,
    pub data_kind: DataKind,
    pub range: DateRangeKey,
    pub credential: String,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// 拉取一份指标快照（昂贵，按次计费）
    async fn fetch(&self, request: FetchRequest) -> Result<SnapshotPayload, ProviderError>;

    /// 轻量身份探测，不拉取指标
    async fn probe(&self, credential: &str) -> Result<ProbeIdentity, ProviderError>;
}

/// 两个提供方客户端的集合
#[derive(Clone)]
pub struct Providers {
    analytics: Arc<dyn ProviderClient>,
    seo: Arc<dyn ProviderClient>,
}

impl Providers {
    pub fn new(analytics: Arc<dyn ProviderClient>, seo: Arc<dyn ProviderClient>) -> Self {
        debug_assert_eq!(analytics.kind(), ProviderKind::Analytics);
        debug_assert_eq!(seo.kind(), ProviderKind::Seo);
        Self { analytics, seo }
    }

    pub fn for_kind(&self, provider: ProviderKind) -> Arc<dyn ProviderClient> {
        match provider {
            ProviderKind::Analytics => self.analytics.clone(),
            ProviderKind::Seo => self.seo.clone(),
        }
    }
}
