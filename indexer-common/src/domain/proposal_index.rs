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

use crate::domain::{
    ChainId, ProposalDocument, ProposalStage,
    predicate::{Field, Predicate, QueryFilter, Sort},
};
use std::{collections::HashMap, error::Error as StdError};

/// Maximum number of documents returned by one [ProposalIndex::scan_excluding] call.
pub const SCAN_LIMIT: u64 = 1_000;

/// A page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub items: Vec<ProposalDocument>,

    /// Number of all matching documents, irrespective of skip and limit.
    pub total_matched: u64,
}

/// The searchable store of proposal documents.
#[trait_variant::make(Send)]
pub trait ProposalIndex
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Insert or fully replace the given documents by ID. Succeeds or fails as a whole.
    async fn upsert(&self, documents: &[ProposalDocument]) -> Result<(), Self::Error>;

    /// Search with the given query tree, sort and pagination.
    async fn search(
        &self,
        predicate: &Predicate,
        sort: Sort,
        skip: u64,
        limit: u64,
    ) -> Result<SearchPage, Self::Error>;

    /// Get the proposal with the given ID on the given chain.
    async fn get_by_id(
        &self,
        chain_id: &ChainId,
        proposal_id: &str,
    ) -> Result<Option<ProposalDocument>, Self::Error>;

    /// Get the proposals with the given IDs on the given chain, keyed by proposal ID.
    async fn get_by_ids(
        &self,
        chain_id: &ChainId,
        proposal_ids: &[String],
    ) -> Result<HashMap<String, ProposalDocument>, Self::Error>;

    /// Get all proposals of the given DAO, unpaged.
    async fn get_by_parent(
        &self,
        chain_id: &ChainId,
        dao_id: &str,
    ) -> Result<Vec<ProposalDocument>, Self::Error>;

    /// Count the proposals of the given DAO.
    async fn count_by_scope(&self, chain_id: &ChainId, dao_id: &str) -> Result<u64, Self::Error>;

    /// Get up to [SCAN_LIMIT] proposals not in any of the given stages, oldest block first.
    async fn scan_excluding(
        &self,
        excluded_stages: &[ProposalStage],
        skip: u64,
    ) -> Result<Vec<ProposalDocument>, Self::Error>;
}

/// Query tree for a single proposal.
pub fn by_id_predicate(chain_id: &ChainId, proposal_id: &str) -> Predicate {
    QueryFilter::new()
        .must(Predicate::term(Field::ChainId, chain_id))
        .must(Predicate::term(Field::ProposalId, proposal_id))
        .into_predicate()
}

/// Query tree for a set of proposals.
pub fn by_ids_predicate(chain_id: &ChainId, proposal_ids: &[String]) -> Predicate {
    QueryFilter::new()
        .must(Predicate::term(Field::ChainId, chain_id))
        .must(Predicate::terms(Field::ProposalId, proposal_ids.iter().cloned()))
        .into_predicate()
}

/// Query tree for all proposals of a DAO.
pub fn by_parent_predicate(chain_id: &ChainId, dao_id: &str) -> Predicate {
    QueryFilter::new()
        .must(Predicate::term(Field::ChainId, chain_id))
        .must(Predicate::term(Field::DaoId, dao_id))
        .into_predicate()
}

/// Query tree for all proposals not in any of the given stages.
pub fn excluding_stages_predicate(excluded_stages: &[ProposalStage]) -> Predicate {
    QueryFilter::new()
        .must(Predicate::terms(Field::ProposalStage, excluded_stages.iter().copied()).negate())
        .into_predicate()
}

/// Sort for exclusion scans: oldest block first.
pub fn scan_sort() -> Sort {
    Sort::ascending(Field::BlockHeight)
}
