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

mod metrics;

use crate::{
    application::metrics::Metrics,
    domain::{
        Source, SyncKind, SyncRange, Watermark, WatermarkError, WatermarkStorage, WatermarkStore,
    },
};
use anyhow::{Context, bail, ensure};
use derive_more::Display;
use fastrace::{Span, future::FutureExt, prelude::SpanContext, trace};
use indexer_common::{
    domain::{ChainId, ProposalIndex},
    error::{BoxError, StdErrorExt},
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::{
    select,
    signal::unix::Signal,
    task::JoinSet,
    time::{self, MissedTickBehavior},
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain_ids: Vec<ChainId>,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "page_size_default")]
    pub page_size: u64,

    #[serde(default = "max_pages_per_tick_default")]
    pub max_pages_per_tick: u32,

    #[serde(default)]
    pub genesis_height: i64,

    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

fn page_size_default() -> u64 {
    100
}

fn max_pages_per_tick_default() -> u32 {
    10
}

/// Settings of a single sync tick.
#[derive(Debug, Clone, Copy)]
pub struct TickConfig {
    pub sync_kind: SyncKind,
    pub page_size: u64,
    pub max_pages_per_tick: u32,
    pub genesis_height: i64,
    pub call_timeout: Duration,
}

impl From<&Config> for TickConfig {
    fn from(config: &Config) -> Self {
        Self {
            sync_kind: SyncKind::ProposalSync,
            page_size: config.page_size.max(1),
            max_pages_per_tick: config.max_pages_per_tick.max(1),
            genesis_height: config.genesis_height,
            call_timeout: config.call_timeout,
        }
    }
}

/// Run one independent sync loop per configured chain until SIGTERM.
pub async fn run(
    config: Config,
    source: impl Source,
    index: impl ProposalIndex,
    watermark_storage: impl WatermarkStorage,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let tick_config = TickConfig::from(&config);
    let Config {
        chain_ids,
        interval,
        max_backoff,
        ..
    } = config;
    ensure!(!interval.is_zero(), "sync interval must not be zero");

    let watermarks = WatermarkStore::new(watermark_storage);

    let mut sync_tasks = JoinSet::new();
    for chain_id in chain_ids {
        info!(chain_id:%, sync_kind:% = tick_config.sync_kind; "starting sync");

        sync_tasks.spawn(sync_chain(
            chain_id,
            tick_config,
            interval,
            max_backoff,
            source.clone(),
            index.clone(),
            watermarks.clone(),
        ));
    }

    select! {
        Some(result) = sync_tasks.join_next() => {
            result.context("sync task panicked")?;
            bail!("sync task completed unexpectedly")
        }

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}

/// Tick the given chain forever. Ticks never overlap; failed ticks are followed by an
/// exponentially growing pause.
async fn sync_chain<S, I, W>(
    chain_id: ChainId,
    tick_config: TickConfig,
    interval: Duration,
    max_backoff: Duration,
    source: S,
    index: I,
    watermarks: WatermarkStore<W>,
) where
    S: Source,
    I: ProposalIndex,
    W: WatermarkStorage,
{
    let metrics = Metrics::new(&chain_id);
    let mut backoff = ErrorBackoff::new(interval, max_backoff);
    let mut ticks = time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;

        let outcome = sync_tick(&chain_id, tick_config, &source, &index, &watermarks)
            .in_span(Span::root("sync-tick", SpanContext::random()))
            .await;
        metrics.record(&outcome);

        match outcome {
            Ok(outcome) => {
                debug!(chain_id:%, outcome:?; "sync tick completed");
                backoff.reset();
            }

            Err(error) => {
                let delay = backoff.next_delay();
                warn!(
                    chain_id:%,
                    phase:% = error.phase(),
                    error:% = error.as_chain(),
                    delay:?;
                    "sync tick failed"
                );
                time::sleep(delay).await;
            }
        }
    }
}

/// Steps of a sync tick.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    #[display("reading watermark")]
    ReadingWatermark,

    #[display("fetching confirmed height")]
    FetchingConfirmedHeight,

    #[display("fetching page")]
    FetchingPage,

    #[display("upserting")]
    Upserting,

    #[display("advancing watermark")]
    AdvancingWatermark,
}

/// Result of a successful sync tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The confirmed height is not above the watermark.
    UpToDate {
        watermark: i64,
        confirmed_height: i64,
    },

    Synced {
        start_height: i64,
        confirmed_height: i64,
        upserted: usize,
        skipped: usize,
        watermark: i64,

        /// Whether fetching stopped at the page cap rather than at the end of the range.
        capped: bool,
    },
}

/// A failed sync tick; the watermark has not been advanced.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("watermark unavailable")]
    WatermarkUnavailable,

    #[error("{phase} timed out after {timeout:?}")]
    Timeout { phase: SyncPhase, timeout: Duration },

    #[error("{phase} failed")]
    Source {
        phase: SyncPhase,

        #[source]
        source: BoxError,
    },

    #[error("cannot upsert proposals")]
    Upsert(#[source] BoxError),

    #[error("cannot advance watermark")]
    AdvanceWatermark(#[source] WatermarkError),
}

impl TickError {
    pub fn phase(&self) -> SyncPhase {
        match self {
            TickError::WatermarkUnavailable => SyncPhase::ReadingWatermark,
            TickError::Timeout { phase, .. } | TickError::Source { phase, .. } => *phase,
            TickError::Upsert(_) => SyncPhase::Upserting,
            TickError::AdvanceWatermark(_) => SyncPhase::AdvancingWatermark,
        }
    }
}

/// One sync tick for the given chain: fetch the records in `[watermark, confirmed height)` page by
/// page, upsert them and only then advance the watermark.
#[trace(properties = { "chain_id": "{chain_id}" })]
pub async fn sync_tick<S, I, W>(
    chain_id: &ChainId,
    config: TickConfig,
    source: &S,
    index: &I,
    watermarks: &WatermarkStore<W>,
) -> Result<TickOutcome, TickError>
where
    S: Source,
    I: ProposalIndex,
    W: WatermarkStorage,
{
    let TickConfig {
        sync_kind,
        page_size,
        max_pages_per_tick,
        genesis_height,
        call_timeout,
    } = config;

    let watermark = time::timeout(call_timeout, watermarks.get_height(chain_id, sync_kind))
        .await
        .unwrap_or(Watermark::Unavailable);
    let watermark = match watermark {
        Watermark::Height(height) => height,
        Watermark::Unset => genesis_height,
        Watermark::Unavailable => return Err(TickError::WatermarkUnavailable),
    };

    let confirmed_height = timed(
        SyncPhase::FetchingConfirmedHeight,
        call_timeout,
        source.confirmed_height(chain_id),
    )
    .await?
    .map_err(|error| TickError::Source {
        phase: SyncPhase::FetchingConfirmedHeight,
        source: error.into(),
    })?;

    if confirmed_height <= watermark {
        debug!(chain_id:%, watermark, confirmed_height; "nothing to sync");
        return Ok(TickOutcome::UpToDate {
            watermark,
            confirmed_height,
        });
    }

    let mut records = vec![];
    let mut skip_count = 0;
    let mut exhausted = false;

    for _ in 0..max_pages_per_tick {
        let range = SyncRange {
            chain_id: chain_id.to_owned(),
            sync_kind,
            start_height: watermark,
            end_height: confirmed_height,
            skip_count,
            page_size,
        };

        let page = timed(
            SyncPhase::FetchingPage,
            call_timeout,
            source.proposal_page(&range),
        )
        .await?
        .map_err(|error| TickError::Source {
            phase: SyncPhase::FetchingPage,
            source: error.into(),
        })?;

        let page_len = page.len() as u64;
        debug!(chain_id:%, skip_count, page_len; "fetched page");

        records.extend(page);
        skip_count += page_len;

        if page_len < page_size {
            exhausted = true;
            break;
        }
    }

    let mut documents = Vec::with_capacity(records.len());
    let mut highest_mapped = None;
    let mut highest_skipped = None;

    for record in records {
        let mapped = match record {
            Ok(record) => {
                let block_height = record.block_height;
                let proposal_id = record.proposal_id.clone();
                record
                    .into_document(chain_id)
                    .map_err(|error| (block_height, proposal_id, BoxError::from(error)))
            }

            Err(error) => Err((
                error.block_height,
                error.proposal_id.clone(),
                BoxError::from(error),
            )),
        };

        match mapped {
            Ok(document) => {
                highest_mapped = highest_mapped.max(Some(document.block_height));
                documents.push(document);
            }

            Err((block_height, proposal_id, error)) => {
                warn!(
                    chain_id:%,
                    block_height:?,
                    proposal_id:?,
                    error:% = error.as_chain();
                    "skipping proposal record"
                );
                // A record without height cannot be placed, hence it counts as the highest.
                highest_skipped = highest_skipped.max(Some(block_height.unwrap_or(i64::MAX)));
            }
        }
    }

    let upserted = documents.len();
    let skipped = skip_count as usize - upserted;

    if !documents.is_empty() {
        timed(SyncPhase::Upserting, call_timeout, index.upsert(&documents))
            .await?
            .map_err(|error| TickError::Upsert(error.into()))?;
    }

    let credited = credited_height(
        watermark,
        confirmed_height,
        exhausted,
        highest_mapped,
        highest_skipped,
    );

    if credited > watermark {
        // A raise that times out after reaching its cell is still applied later. The documents
        // are committed at that point, so the next tick at worst refetches them.
        timed(
            SyncPhase::AdvancingWatermark,
            call_timeout,
            watermarks.set_height(chain_id, sync_kind, credited),
        )
        .await?
        .map_err(TickError::AdvanceWatermark)?;

        info!(chain_id:%, upserted, skipped, watermark = credited; "advanced watermark");
    } else if !exhausted {
        warn!(
            chain_id:%,
            watermark,
            page_size,
            max_pages_per_tick;
            "page cap reached without progress"
        );
    }

    Ok(TickOutcome::Synced {
        start_height: watermark,
        confirmed_height,
        upserted,
        skipped,
        watermark: credited,
        capped: !exhausted,
    })
}

/// The height committed by a tick. The whole range up to the confirmed height is credited only
/// if it was fetched completely and no skipped record lies at or above the highest mapped one;
/// otherwise just up to the highest mapped height. Never below the current watermark.
fn credited_height(
    watermark: i64,
    confirmed_height: i64,
    exhausted: bool,
    highest_mapped: Option<i64>,
    highest_skipped: Option<i64>,
) -> i64 {
    let skipped_covered = match (highest_skipped, highest_mapped) {
        (None, _) => true,
        (Some(skipped), Some(mapped)) => skipped < mapped,
        (Some(_), None) => false,
    };

    if exhausted && skipped_covered {
        confirmed_height
    } else {
        highest_mapped.unwrap_or(watermark).max(watermark)
    }
}

async fn timed<T, E>(
    phase: SyncPhase,
    timeout: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<Result<T, E>, TickError> {
    time::timeout(timeout, call)
        .await
        .map_err(|_| TickError::Timeout { phase, timeout })
}

/// Pause after consecutive failed ticks, doubling from the interval up to a maximum.
#[derive(Debug)]
struct ErrorBackoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl ErrorBackoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let factor = 2_u32.saturating_pow(self.failures);
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}
