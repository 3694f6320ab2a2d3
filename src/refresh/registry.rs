use std::sync::Arc;

use uuid::Uuid;

use super::clock::Clock;
use crate::models::{ConnectionRecord, ProviderKind};
use crate::store::{ConnectionStore, StoreError};

/// 连接登记表，只做存储，不做业务判断
///
/// `set_invalid` 不会清理缓存指标，清理由校验器显式完成。
#[derive(Clone)]
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
    clock: Arc<dyn Clock>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<ConnectionRecord, StoreError> {
        self.store.get(client_id, provider).await
    }

    pub async fn credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<String>, StoreError> {
        self.store.credential(client_id, provider).await
    }

    pub async fn store_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        credential: &str,
    ) -> Result<(), StoreError> {
        self.store
            .store_credential(client_id, provider, credential)
            .await
    }

    pub async fn set_valid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        account_label: Option<&str>,
    ) -> Result<(), StoreError> {
        self.store
            .set_valid(client_id, provider, account_label, self.clock.now())
            .await
    }

    pub async fn set_invalid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), StoreError> {
        self.store
            .set_invalid(client_id, provider, self.clock.now())
            .await
    }

    pub async fn clear_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), StoreError> {
        self.store.clear_credential(client_id, provider).await
    }
}
