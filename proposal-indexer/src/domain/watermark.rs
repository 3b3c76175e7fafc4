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

use derive_more::Display;
use indexer_common::{
    domain::ChainId,
    error::{BoxError, StdErrorExt},
};
use log::warn;
use std::{error::Error as StdError, sync::Arc};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task,
};

/// Number of commands a watermark cell buffers before callers have to wait.
const CELL_INBOX_SIZE: usize = 16;

/// What a watermark tracks progress of.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    #[display("proposal_sync")]
    ProposalSync,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::ProposalSync => "proposal_sync",
        }
    }
}

/// Identity of a watermark.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[display("{sync_kind}/{chain_id}")]
pub struct WatermarkKey {
    pub sync_kind: SyncKind,
    pub chain_id: ChainId,
}

impl WatermarkKey {
    pub fn new(chain_id: ChainId, sync_kind: SyncKind) -> Self {
        Self {
            sync_kind,
            chain_id,
        }
    }
}

/// Result of reading a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Never recorded.
    Unset,

    /// The last durably recorded height.
    Height(i64),

    /// Reading failed; callers must not make progress based on this.
    Unavailable,
}

/// Durable key to height cells, the persistence behind [WatermarkStore].
#[trait_variant::make(Send)]
pub trait WatermarkStorage
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Load the height for the given key, `None` if never recorded.
    async fn load_height(&self, key: &WatermarkKey) -> Result<Option<i64>, Self::Error>;

    /// Record the given height for the given key unless a higher one is already recorded.
    async fn raise_height(&self, key: &WatermarkKey, height: i64) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("cannot record watermark {key}")]
    Storage {
        key: WatermarkKey,

        #[source]
        source: BoxError,
    },

    #[error("watermark cell for {0} is gone")]
    CellGone(WatermarkKey),
}

enum Command {
    GetHeight {
        reply: oneshot::Sender<Watermark>,
    },

    SetHeight {
        height: i64,
        reply: oneshot::Sender<Result<(), WatermarkError>>,
    },
}

/// Per-key single writer for watermarks. Each key is owned by a cell task which processes
/// commands one at a time, so operations on one key never interleave while distinct keys proceed
/// concurrently.
#[derive(Debug, Clone)]
pub struct WatermarkStore<S> {
    storage: S,
    cells: Arc<dashmap::DashMap<WatermarkKey, mpsc::Sender<Command>>>,
}

impl<S> WatermarkStore<S>
where
    S: WatermarkStorage,
{
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            cells: Default::default(),
        }
    }

    /// Get the watermark for the given key. Never fails: storage failures are reported as
    /// [Watermark::Unavailable].
    pub async fn get_height(&self, chain_id: &ChainId, sync_kind: SyncKind) -> Watermark {
        let key = WatermarkKey::new(chain_id.to_owned(), sync_kind);
        let (reply, response) = oneshot::channel();

        if !self.send(&key, Command::GetHeight { reply }).await {
            return Watermark::Unavailable;
        }

        response.await.unwrap_or(Watermark::Unavailable)
    }

    /// Durably record the given height for the given key. Recording a height not above the stored
    /// one has no effect.
    pub async fn set_height(
        &self,
        chain_id: &ChainId,
        sync_kind: SyncKind,
        height: i64,
    ) -> Result<(), WatermarkError> {
        let key = WatermarkKey::new(chain_id.to_owned(), sync_kind);
        let (reply, response) = oneshot::channel();

        if !self.send(&key, Command::SetHeight { height, reply }).await {
            return Err(WatermarkError::CellGone(key));
        }

        response
            .await
            .unwrap_or_else(|_| Err(WatermarkError::CellGone(key)))
    }

    /// Send the given command to the cell for the given key, spawning the cell if needed. Returns
    /// whether the command was delivered.
    async fn send(&self, key: &WatermarkKey, command: Command) -> bool {
        let cell = self
            .cells
            .entry(key.to_owned())
            .or_insert_with(|| {
                let (sender, commands) = mpsc::channel(CELL_INBOX_SIZE);
                task::spawn(run_cell(key.to_owned(), self.storage.clone(), commands));
                sender
            })
            .value()
            .clone();

        let delivered = cell.send(command).await.is_ok();
        if !delivered {
            // Respawned on next use.
            self.cells.remove(key);
        }

        delivered
    }
}

async fn run_cell<S>(key: WatermarkKey, storage: S, mut commands: mpsc::Receiver<Command>)
where
    S: WatermarkStorage,
{
    while let Some(command) = commands.recv().await {
        match command {
            Command::GetHeight { reply } => {
                let watermark = match storage.load_height(&key).await {
                    Ok(Some(height)) => Watermark::Height(height),
                    Ok(None) => Watermark::Unset,

                    Err(error) => {
                        warn!(key:%, error:% = error.as_chain(); "cannot load watermark");
                        Watermark::Unavailable
                    }
                };

                let _ = reply.send(watermark);
            }

            Command::SetHeight { height, reply } => {
                let result = storage
                    .raise_height(&key, height)
                    .await
                    .map_err(|error| WatermarkError::Storage {
                        key: key.clone(),
                        source: error.into(),
                    });

                let _ = reply.send(result);
            }
        }
    }
}
