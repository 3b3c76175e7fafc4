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

use anyhow::Context;
use indexer_common::{
    config::ConfigExt,
    infra::{migrations, pool::Pool, proposal_index::SqlxProposalIndex},
    telemetry,
};
use log::{error, info};
use proposal_indexer::{
    application,
    config::Config,
    infra::{self, graphql_source::GraphQlSource, watermark_storage::SqlxWatermarkStorage},
};
use std::panic;
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() {
    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let sigterm = signal(SignalKind::terminate()).context("register SIGTERM handler")?;

    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        run_migrations,
        application_config,
        infra_config,
        telemetry_config:
            telemetry::Config {
                tracing_config,
                metrics_config,
            },
    } = config;

    telemetry::init_tracing(tracing_config);
    telemetry::init_metrics(metrics_config);

    let infra::Config {
        source_config,
        storage_config,
    } = infra_config;

    let pool = Pool::new(storage_config)
        .await
        .context("create DB pool")?;
    if run_migrations {
        migrations::run(&pool).await.context("run DB migrations")?;
    }

    let source = GraphQlSource::new(source_config).context("create GraphQL source")?;
    let index = SqlxProposalIndex::new(pool.clone());
    let watermark_storage = SqlxWatermarkStorage::new(pool);

    application::run(application_config, source, index, watermark_storage, sigterm)
        .await
        .context("run proposal indexer application")
}
