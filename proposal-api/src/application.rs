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

use crate::domain::{Api, QueryEngine};
use anyhow::Context;
use indexer_common::domain::ProposalIndex;
use log::warn;
use serde::Deserialize;
use tokio::{select, signal::unix::Signal, task};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Upper bound for the page size of searches.
    #[serde(default = "max_page_size_default")]
    pub max_page_size: u64,
}

pub async fn run(
    config: Config,
    index: impl ProposalIndex,
    api: impl Api,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let Config { max_page_size } = config;

    let engine = QueryEngine::new(index, max_page_size);
    let serve_api_task = task::spawn(async move {
        api.serve(engine)
            .await
            .context("serving proposal API")
    });

    select! {
        result = serve_api_task => result
            .context("serve_api_task panicked")
            .and_then(|result| result.context("serve_api_task failed")),

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}

fn max_page_size_default() -> u64 {
    100
}
