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
    ChainId, ProposalDocument, ProposalIndex, ProposalStage, SCAN_LIMIT, SearchPage,
    by_id_predicate, by_ids_predicate, by_parent_predicate, excluding_stages_predicate,
    predicate::{Predicate, Sort},
    scan_sort,
};
use parking_lot::RwLock;
use std::{collections::HashMap, convert::Infallible, sync::Arc};

/// In-memory [ProposalIndex] implementation evaluating query trees directly.
#[derive(Debug, Default, Clone)]
pub struct InMemProposalIndex {
    documents: Arc<RwLock<HashMap<String, ProposalDocument>>>,
}

impl InMemProposalIndex {
    fn matching(&self, predicate: &Predicate, sort: Sort) -> Vec<ProposalDocument> {
        let mut documents = self
            .documents
            .read()
            .values()
            .filter(|document| predicate.matches(document))
            .cloned()
            .collect::<Vec<_>>();
        documents.sort_by(|a, b| sort.compare(a, b));
        documents
    }
}

impl ProposalIndex for InMemProposalIndex {
    type Error = Infallible;

    async fn upsert(&self, documents: &[ProposalDocument]) -> Result<(), Self::Error> {
        let mut stored = self.documents.write();
        for document in documents {
            stored.insert(document.id.clone(), document.clone());
        }

        Ok(())
    }

    async fn search(
        &self,
        predicate: &Predicate,
        sort: Sort,
        skip: u64,
        limit: u64,
    ) -> Result<SearchPage, Self::Error> {
        let documents = self.matching(predicate, sort);
        let total_matched = documents.len() as u64;
        let items = documents
            .into_iter()
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .collect();

        Ok(SearchPage {
            items,
            total_matched,
        })
    }

    async fn get_by_id(
        &self,
        chain_id: &ChainId,
        proposal_id: &str,
    ) -> Result<Option<ProposalDocument>, Self::Error> {
        let predicate = by_id_predicate(chain_id, proposal_id);
        Ok(self.matching(&predicate, Sort::default()).into_iter().next())
    }

    async fn get_by_ids(
        &self,
        chain_id: &ChainId,
        proposal_ids: &[String],
    ) -> Result<HashMap<String, ProposalDocument>, Self::Error> {
        let predicate = by_ids_predicate(chain_id, proposal_ids);
        let documents = self
            .matching(&predicate, Sort::default())
            .into_iter()
            .map(|document| (document.proposal_id.clone(), document))
            .collect();

        Ok(documents)
    }

    async fn get_by_parent(
        &self,
        chain_id: &ChainId,
        dao_id: &str,
    ) -> Result<Vec<ProposalDocument>, Self::Error> {
        let predicate = by_parent_predicate(chain_id, dao_id);
        Ok(self.matching(&predicate, Sort::default()))
    }

    async fn count_by_scope(&self, chain_id: &ChainId, dao_id: &str) -> Result<u64, Self::Error> {
        let predicate = by_parent_predicate(chain_id, dao_id);
        let count = self
            .documents
            .read()
            .values()
            .filter(|document| predicate.matches(document))
            .count();

        Ok(count as u64)
    }

    async fn scan_excluding(
        &self,
        excluded_stages: &[ProposalStage],
        skip: u64,
    ) -> Result<Vec<ProposalDocument>, Self::Error> {
        let predicate = excluding_stages_predicate(excluded_stages);
        let documents = self
            .matching(&predicate, scan_sort())
            .into_iter()
            .skip(to_usize(skip))
            .take(to_usize(SCAN_LIMIT))
            .collect();

        Ok(documents)
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
