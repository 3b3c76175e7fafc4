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

use crate::domain::SyncKind;
use indexer_common::domain::ChainId;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error as StdError;
use thiserror::Error;

/// The upstream indexer proposal records are synchronized from.
#[trait_variant::make(Send)]
pub trait Source
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// The highest block height the source guarantees to be final and queryable.
    async fn confirmed_height(&self, chain_id: &ChainId) -> Result<i64, Self::Error>;

    /// Up to `range.page_size` records with block heights in `[range.start_height,
    /// range.end_height)`, ordered by block height, skipping the first `range.skip_count`.
    /// Records are decoded one by one, so a malformed record does not fail the page.
    async fn proposal_page(&self, range: &SyncRange) -> Result<Vec<SourceRecord>, Self::Error>;
}

/// A single entry of a proposal page.
pub type SourceRecord = Result<RawProposalRecord, MalformedRecord>;

/// One fetch request, reconstructed every tick from the watermark and the confirmed height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRange {
    pub chain_id: ChainId,
    pub sync_kind: SyncKind,
    pub start_height: i64,
    pub end_height: i64,
    pub skip_count: u64,
    pub page_size: u64,
}

/// A proposal record as reported by the source. Everything but the block height may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProposalRecord {
    pub id: Option<String>,
    pub chain_id: Option<String>,
    pub block_height: Option<i64>,

    #[serde(rename = "dAOId")]
    pub dao_id: Option<String>,

    pub proposal_id: Option<String>,
    pub proposal_title: Option<String>,
    pub proposal_description: Option<String>,
    pub forum_url: Option<String>,
    pub proposal_type: Option<RawEnum>,
    pub proposal_status: Option<RawEnum>,
    pub proposal_stage: Option<RawEnum>,
    pub governance_mechanism: Option<RawEnum>,
    pub proposer: Option<String>,
    pub scheme_address: Option<String>,
    pub transaction: Option<RawTransaction>,
    pub vote_scheme_id: Option<String>,
    pub veto_proposal_id: Option<String>,
    pub deploy_time: Option<String>,
    pub execute_time: Option<String>,
    pub active_start_time: Option<String>,
    pub active_end_time: Option<String>,
    pub execute_start_time: Option<String>,
    pub execute_end_time: Option<String>,
    pub minimal_required_threshold: Option<i64>,
    pub minimal_vote_threshold: Option<i64>,
    pub minimal_approve_threshold: Option<i64>,
    pub maximal_rejection_threshold: Option<i64>,
    pub maximal_abstention_threshold: Option<i64>,
    pub active_time_period: Option<i64>,
    pub veto_active_time_period: Option<i64>,
    pub pending_time_period: Option<i64>,
    pub execute_time_period: Option<i64>,
    pub veto_execute_time_period: Option<i64>,

    #[serde(rename = "isNetworkDAO")]
    pub is_network_dao: Option<bool>,
}

impl RawProposalRecord {
    /// Decode a single record, keeping its height and proposal ID as far as they can be read
    /// if the record as a whole cannot be decoded.
    pub fn decode(value: Value) -> SourceRecord {
        let block_height = value.get("blockHeight").and_then(Value::as_i64);
        let proposal_id = value
            .get("proposalId")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        serde_json::from_value(value).map_err(|source| MalformedRecord {
            block_height,
            proposal_id,
            source,
        })
    }
}

/// A record that does not match the expected shape.
#[derive(Debug, Error)]
#[error("cannot decode proposal record")]
pub struct MalformedRecord {
    pub block_height: Option<i64>,
    pub proposal_id: Option<String>,

    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub to_address: Option<String>,
    pub contract_method_name: Option<String>,
    pub params: Option<String>,
}

/// An enum value reported either by name or by discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawEnum {
    Code(i64),
    Name(String),
}
