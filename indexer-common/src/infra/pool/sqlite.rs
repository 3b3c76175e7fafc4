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

use derive_more::Deref;
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Configuration for a [SqlitePool].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Connection URL, e.g. `sqlite://target/data/indexer.sqlite` or `sqlite::memory:`.
    pub cnn_url: String,

    #[serde(default = "max_connections_default")]
    pub max_connections: u32,
}

impl Config {
    /// Configuration for an in-memory database. A single connection is kept open for the lifetime
    /// of the pool, because every connection to `sqlite::memory:` has its own database.
    pub fn in_memory() -> Self {
        Self {
            cnn_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

fn max_connections_default() -> u32 {
    4
}

/// New-type for a Sqlite connection pool.
#[derive(Debug, Clone, Deref)]
pub struct SqlitePool(sqlx::SqlitePool);

impl SqlitePool {
    /// Try to create a new [SqlitePool] with the given [Config]; the database file is created if
    /// missing.
    pub async fn new(config: Config) -> Result<Self, sqlx::Error> {
        let Config {
            cnn_url,
            max_connections,
        } = config;

        let connect_options = SqliteConnectOptions::from_str(&cnn_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        Ok(Self(pool))
    }
}
