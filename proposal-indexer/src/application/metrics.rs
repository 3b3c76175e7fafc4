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

use crate::application::{TickError, TickOutcome};
use indexer_common::domain::ChainId;
use metrics::{Counter, Gauge, counter, gauge};

/// Sync metrics of a single chain.
pub struct Metrics {
    chain_id: String,
    documents_upserted: Counter,
    records_skipped: Counter,
    watermark: Gauge,
}

impl Metrics {
    pub fn new(chain_id: &ChainId) -> Self {
        let chain_id = chain_id.to_string();

        let documents_upserted =
            counter!("proposal_indexer_documents_upserted", "chain_id" => chain_id.clone());
        let records_skipped =
            counter!("proposal_indexer_records_skipped", "chain_id" => chain_id.clone());
        let watermark = gauge!("proposal_indexer_watermark", "chain_id" => chain_id.clone());

        Self {
            chain_id,
            documents_upserted,
            records_skipped,
            watermark,
        }
    }

    pub fn record(&self, outcome: &Result<TickOutcome, TickError>) {
        let label = match outcome {
            Ok(TickOutcome::UpToDate { watermark, .. }) => {
                self.watermark.set(*watermark as f64);
                "up_to_date"
            }

            Ok(TickOutcome::Synced {
                upserted,
                skipped,
                watermark,
                ..
            }) => {
                self.documents_upserted.increment(*upserted as u64);
                self.records_skipped.increment(*skipped as u64);
                self.watermark.set(*watermark as f64);
                "synced"
            }

            Err(_) => "failed",
        };

        counter!(
            "proposal_indexer_ticks",
            "chain_id" => self.chain_id.clone(),
            "outcome" => label
        )
        .increment(1);
    }
}
