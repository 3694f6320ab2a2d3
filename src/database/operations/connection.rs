use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ConnectionRecord, ProviderKind};
use crate::store::{ConnectionStore, StoreError};

/// 提供方连接记录
pub struct PgConnectionStore {
    db: Arc<PgPool>,
}

impl PgConnectionStore {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    has_credential: bool,
    believed_valid: bool,
    last_validated_at: Option<DateTime<Utc>>,
    account_label: Option<String>,
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn get(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<ConnectionRecord, StoreError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            r#"
            SELECT
                credential IS NOT NULL AS has_credential,
                believed_valid,
                last_validated_at,
                account_label
            FROM provider_connections
            WHERE client_id = $1 AND provider = $2
            "#,
        )
        .bind(client_id)
        .bind(provider.as_str())
        .fetch_optional(&*self.db)
        .await?;

        Ok(row
            .map(|row| ConnectionRecord {
                has_credential: row.has_credential,
                believed_valid: row.believed_valid,
                last_validated_at: row.last_validated_at,
                account_label: row.account_label,
            })
            .unwrap_or_default())
    }

    async fn credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<String>, StoreError> {
        let credential: Option<Option<String>> = sqlx::query_scalar(
            "SELECT credential FROM provider_connections WHERE client_id = $1 AND provider = $2",
        )
        .bind(client_id)
        .bind(provider.as_str())
        .fetch_optional(&*self.db)
        .await?;

        Ok(credential.flatten())
    }

    async fn store_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        credential: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO provider_connections (client_id, provider, credential, believed_valid, updated_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            ON CONFLICT (client_id, provider) DO UPDATE
            SET credential = EXCLUDED.credential,
                believed_valid = FALSE,
                updated_at = NOW()
            "#,
        )
        .bind(client_id)
        .bind(provider.as_str())
        .bind(credential)
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn set_valid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        account_label: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // 没有凭证的行不会被更新
        let result = sqlx::query(
            r#"
            UPDATE provider_connections
            SET believed_valid = TRUE,
                last_validated_at = $3,
                account_label = COALESCE($4, account_label),
                updated_at = NOW()
            WHERE client_id = $1 AND provider = $2 AND credential IS NOT NULL
            "#,
        )
        .bind(client_id)
        .bind(provider.as_str())
        .bind(validated_at)
        .bind(account_label)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingCredential {
                client_id,
                provider,
            });
        }
        Ok(())
    }

    async fn set_invalid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        validated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE provider_connections
            SET believed_valid = FALSE, last_validated_at = $3, updated_at = NOW()
            WHERE client_id = $1 AND provider = $2
            "#,
        )
        .bind(client_id)
        .bind(provider.as_str())
        .bind(validated_at)
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn clear_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE provider_connections
            SET credential = NULL, believed_valid = FALSE, account_label = NULL, updated_at = NOW()
            WHERE client_id = $1 AND provider = $2
            "#,
        )
        .bind(client_id)
        .bind(provider.as_str())
        .execute(&*self.db)
        .await?;

        Ok(())
    }
}
