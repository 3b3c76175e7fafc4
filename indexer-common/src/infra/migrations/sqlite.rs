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

use crate::infra::pool::sqlite::SqlitePool;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Run the database migrations for Sqlite.
pub async fn run(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::migrate!("migrations/sqlite").run(&**pool).await?;
    Ok(())
}

/// Error possibly returned by [run].
#[derive(Debug, Error)]
#[error("cannot run migrations for sqlite")]
pub struct Error(#[from] MigrateError);

#[cfg(test)]
mod tests {
    use crate::infra::{
        migrations::sqlite::run,
        pool::sqlite::{Config, SqlitePool},
    };
    use std::error::Error as StdError;

    #[tokio::test]
    async fn test_run() -> Result<(), Box<dyn StdError>> {
        let pool = SqlitePool::new(Config::in_memory()).await?;

        run(&pool).await?;
        // Migrations are tracked, hence running them again is a no-op.
        run(&pool).await?;

        let table_names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&*pool)
        .await?;

        assert!(table_names.iter().any(|name| name == "proposals"));
        assert!(table_names.iter().any(|name| name == "sync_watermarks"));

        Ok(())
    }
}
