//! 返回预设结果的提供方，用于测试和本地演示

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{FetchRequest, ProviderClient, ProviderError};
use crate::models::{DataKind, ProbeIdentity, ProviderKind, SnapshotPayload};

pub struct StubProvider {
    kind: ProviderKind,
    responses: Mutex<HashMap<DataKind, Result<SnapshotPayload, ProviderError>>>,
    probe: Mutex<Result<ProbeIdentity, ProviderError>>,
    delay: Mutex<Option<Duration>>,
    probe_delay: Mutex<Option<Duration>>,
    fetch_calls: Mutex<HashMap<DataKind, usize>>,
    probe_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            responses: Mutex::new(HashMap::new()),
            probe: Mutex::new(Ok(ProbeIdentity {
                account_label: Some(format!("{} account", kind)),
            })),
            delay: Mutex::new(None),
            probe_delay: Mutex::new(None),
            fetch_calls: Mutex::new(HashMap::new()),
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// 之后每次拉取该类型都返回这个结果
    pub fn respond_with(&self, kind: DataKind, result: Result<SnapshotPayload, ProviderError>) {
        self.responses.lock().insert(kind, result);
    }

    pub fn probe_with(&self, result: Result<ProbeIdentity, ProviderError>) {
        *self.probe.lock() = result;
    }

    /// 模拟慢速上游
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = Some(delay);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.lock().values().sum()
    }

    pub fn fetch_calls_for(&self, kind: DataKind) -> usize {
        self.fetch_calls.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, request: FetchRequest) -> Result<SnapshotPayload, ProviderError> {
        *self.fetch_calls.lock().entry(request.data_kind).or_insert(0) += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .get(&request.data_kind)
            .cloned()
            .unwrap_or_else(|| {
                Err(ProviderError::Unavailable(format!(
                    "no canned response for {}",
                    request.data_kind
                )))
            })
    }

    async fn probe(&self, _credential: &str) -> Result<ProbeIdentity, ProviderError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.probe_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.probe.lock().clone()
    }
}
