// This file is part of proposal-indexer.
// Copyright (C) 2025 TomorrowDAO
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod in_mem;

use crate::domain::{WatermarkKey, WatermarkStorage};
use fastrace::trace;
use indexer_common::infra::pool::Pool;
use indoc::indoc;

/// Sqlx based [WatermarkStorage] implementation, one row per key.
#[derive(Debug, Clone)]
pub struct SqlxWatermarkStorage {
    pool: Pool,
}

impl SqlxWatermarkStorage {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl WatermarkStorage for SqlxWatermarkStorage {
    type Error = sqlx::Error;

    #[trace(properties = { "key": "{key}" })]
    async fn load_height(&self, key: &WatermarkKey) -> Result<Option<i64>, Self::Error> {
        let query = indoc! {"
            SELECT height
            FROM sync_watermarks
            WHERE sync_kind = $1
            AND chain_id = $2
        "};

        sqlx::query_scalar::<_, i64>(query)
            .bind(key.sync_kind.as_str())
            .bind(key.chain_id.to_string())
            .fetch_optional(&*self.pool)
            .await
    }

    #[trace(properties = { "key": "{key}", "height": "{height}" })]
    async fn raise_height(&self, key: &WatermarkKey, height: i64) -> Result<(), Self::Error> {
        let query = indoc! {"
            INSERT INTO sync_watermarks (sync_kind, chain_id, height)
            VALUES ($1, $2, $3)
            ON CONFLICT (sync_kind, chain_id) DO UPDATE
            SET height = excluded.height
            WHERE sync_watermarks.height < excluded.height
        "};

        sqlx::query(query)
            .bind(key.sync_kind.as_str())
            .bind(key.chain_id.to_string())
            .bind(height)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{SyncKind, WatermarkKey, WatermarkStorage},
        infra::watermark_storage::SqlxWatermarkStorage,
    };
    use indexer_common::domain::ChainId;
    use std::error::Error as StdError;

    async fn raise_height_is_monotonic(
        storage: SqlxWatermarkStorage,
    ) -> Result<(), Box<dyn StdError>> {
        let aelf = WatermarkKey::new(ChainId::try_from("AELF")?, SyncKind::ProposalSync);
        let tdvv = WatermarkKey::new(ChainId::try_from("tDVV")?, SyncKind::ProposalSync);

        assert_eq!(storage.load_height(&aelf).await?, None);

        storage.raise_height(&aelf, 100).await?;
        storage.raise_height(&aelf, 100).await?;
        assert_eq!(storage.load_height(&aelf).await?, Some(100));

        storage.raise_height(&aelf, 50).await?;
        assert_eq!(storage.load_height(&aelf).await?, Some(100));

        storage.raise_height(&aelf, 150).await?;
        assert_eq!(storage.load_height(&aelf).await?, Some(150));

        assert_eq!(storage.load_height(&tdvv).await?, None);

        Ok(())
    }

    #[cfg(not(feature = "cloud"))]
    #[tokio::test]
    async fn test_raise_height() -> Result<(), Box<dyn StdError>> {
        use indexer_common::infra::{
            migrations,
            pool::sqlite::{Config, SqlitePool},
        };

        let pool = SqlitePool::new(Config::in_memory()).await?;
        migrations::run(&pool).await?;

        raise_height_is_monotonic(SqlxWatermarkStorage::new(pool)).await
    }

    #[cfg(feature = "cloud")]
    #[tokio::test]
    async fn test_raise_height() -> Result<(), Box<dyn StdError>> {
        use indexer_common::infra::{
            migrations,
            pool::postgres::{Config, PostgresPool},
        };
        use sqlx::postgres::PgSslMode;
        use std::time::Duration;
        use testcontainers::{ImageExt, runners::AsyncRunner};
        use testcontainers_modules::postgres::Postgres;

        let postgres_container = Postgres::default()
            .with_db_name("proposals")
            .with_user("indexer")
            .with_password("indexer")
            .with_tag("17.1-alpine")
            .start()
            .await?;
        let postgres_port = postgres_container.get_host_port_ipv4(5432).await?;

        let config = Config {
            host: "localhost".to_string(),
            port: postgres_port,
            dbname: "proposals".to_string(),
            user: "indexer".to_string(),
            password: "indexer".into(),
            sslmode: PgSslMode::Prefer,
            max_connections: 10,
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(5 * 60),
        };
        let pool = PostgresPool::new(config).await?;
        migrations::run(&pool).await?;

        raise_height_is_monotonic(SqlxWatermarkStorage::new(pool)).await
    }
}
