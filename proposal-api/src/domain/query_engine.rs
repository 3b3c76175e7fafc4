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

use indexer_common::{
    domain::{
        ChainId, GovernanceMechanism, InvalidChainIdError, ProposalDocument, ProposalIndex,
        ProposalStage, ProposalStatus, ProposalType, SearchPage,
        predicate::{Field, Predicate, QueryFilter, Sort},
    },
    error::BoxError,
};
use std::collections::HashMap;
use thiserror::Error;

/// A search request of the caller-facing query interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalQuery {
    pub chain_id: String,
    pub dao_id: Option<String>,
    pub governance_mechanism: Option<GovernanceMechanism>,
    pub proposal_type: Option<ProposalType>,
    pub proposal_status: Option<ProposalStatus>,

    /// Free text matched against title, description and proposal ID.
    pub content: Option<String>,

    pub skip: u64,
    pub limit: u64,
}

impl ProposalQuery {
    /// The query tree for this request. Fails for a malformed chain ID.
    pub fn predicate(&self) -> Result<Predicate, QueryError> {
        let chain_id = parse_chain_id(&self.chain_id)?;

        let dao_id = self
            .dao_id
            .as_deref()
            .filter(|dao_id| !dao_id.is_empty())
            .map(|dao_id| Predicate::term(Field::DaoId, dao_id));

        let filter = QueryFilter::new()
            .must(Predicate::term(Field::ChainId, &chain_id))
            .must_opt(dao_id)
            .must_opt(
                self.governance_mechanism
                    .map(|mechanism| Predicate::term(Field::GovernanceMechanism, mechanism)),
            )
            .must_opt(
                self.proposal_type
                    .map(|proposal_type| Predicate::term(Field::ProposalType, proposal_type)),
            )
            .must_opt(
                self.proposal_status
                    .map(|status| Predicate::term(Field::ProposalStatus, status)),
            );

        let content = self
            .content
            .as_deref()
            .map(str::trim)
            .filter(|content| !content.is_empty());

        let filter = match content {
            Some(content) => filter
                .should(Predicate::matching(Field::ProposalTitle, content))
                .should(Predicate::matching(Field::ProposalDescription, content))
                .should(Predicate::matching(Field::ProposalId, content)),

            None => filter,
        };

        Ok(filter.into_predicate())
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid chain ID")]
    InvalidChainId(#[from] InvalidChainIdError),

    #[error("cannot query proposal index")]
    Index(#[source] BoxError),
}

/// Validates requests and translates them into [ProposalIndex] calls.
#[derive(Debug, Clone)]
pub struct QueryEngine<I> {
    index: I,
    max_page_size: u64,
}

impl<I> QueryEngine<I>
where
    I: ProposalIndex,
{
    pub fn new(index: I, max_page_size: u64) -> Self {
        Self {
            index,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Search with the given request, most recently deployed first; the limit is capped at the
    /// maximum page size.
    pub async fn search(&self, query: &ProposalQuery) -> Result<SearchPage, QueryError> {
        let predicate = query.predicate()?;
        let limit = query.limit.min(self.max_page_size);

        self.index
            .search(&predicate, Sort::default(), query.skip, limit)
            .await
            .map_err(index_error)
    }

    pub async fn get_by_id(
        &self,
        chain_id: &str,
        proposal_id: &str,
    ) -> Result<Option<ProposalDocument>, QueryError> {
        let chain_id = parse_chain_id(chain_id)?;

        self.index
            .get_by_id(&chain_id, proposal_id)
            .await
            .map_err(index_error)
    }

    pub async fn get_by_ids(
        &self,
        chain_id: &str,
        proposal_ids: &[String],
    ) -> Result<HashMap<String, ProposalDocument>, QueryError> {
        let chain_id = parse_chain_id(chain_id)?;

        self.index
            .get_by_ids(&chain_id, proposal_ids)
            .await
            .map_err(index_error)
    }

    pub async fn get_by_parent(
        &self,
        chain_id: &str,
        dao_id: &str,
    ) -> Result<Vec<ProposalDocument>, QueryError> {
        let chain_id = parse_chain_id(chain_id)?;

        self.index
            .get_by_parent(&chain_id, dao_id)
            .await
            .map_err(index_error)
    }

    pub async fn count_by_scope(&self, chain_id: &str, dao_id: &str) -> Result<u64, QueryError> {
        let chain_id = parse_chain_id(chain_id)?;

        self.index
            .count_by_scope(&chain_id, dao_id)
            .await
            .map_err(index_error)
    }

    pub async fn scan_excluding(
        &self,
        excluded_stages: &[ProposalStage],
        skip: u64,
    ) -> Result<Vec<ProposalDocument>, QueryError> {
        self.index
            .scan_excluding(excluded_stages, skip)
            .await
            .map_err(index_error)
    }
}

fn parse_chain_id(chain_id: &str) -> Result<ChainId, QueryError> {
    let chain_id = ChainId::try_from(chain_id)?;
    Ok(chain_id)
}

fn index_error<E>(error: E) -> QueryError
where
    E: Into<BoxError>,
{
    QueryError::Index(error.into())
}

#[cfg(test)]
mod tests {
    use crate::domain::{ProposalQuery, QueryEngine, QueryError};
    use assert_matches::assert_matches;
    use indexer_common::{
        domain::{
            ChainId, GovernanceMechanism, ProposalDocument, ProposalIndex, ProposalStatus,
            predicate::{Field, Predicate},
        },
        infra::proposal_index::in_mem::InMemProposalIndex,
    };

    fn document(chain_id: &str, proposal_id: &str, title: &str) -> ProposalDocument {
        let chain_id = ChainId::try_from(chain_id).expect("chain ID is valid");
        let mut document = ProposalDocument::new(chain_id, proposal_id, 1);
        document.dao_id = "dao".to_owned();
        document.proposal_title = title.to_owned();
        document
    }

    async fn engine(documents: &[ProposalDocument]) -> QueryEngine<InMemProposalIndex> {
        let index = InMemProposalIndex::default();
        index
            .upsert(documents)
            .await
            .expect("documents can be upserted");
        QueryEngine::new(index, 10)
    }

    fn query(chain_id: &str) -> ProposalQuery {
        ProposalQuery {
            chain_id: chain_id.to_owned(),
            limit: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_predicate() {
        let predicate = query("AELF").predicate().expect("query is valid");
        assert_eq!(
            predicate,
            Predicate::Bool {
                must: vec![Predicate::term(
                    Field::ChainId,
                    &ChainId::try_from("AELF").expect("chain ID is valid")
                )],
                should: vec![],
            }
        );

        let predicate = ProposalQuery {
            dao_id: Some("dao".to_owned()),
            governance_mechanism: Some(GovernanceMechanism::Referendum),
            content: Some("  upgrade ".to_owned()),
            ..query("AELF")
        }
        .predicate()
        .expect("query is valid");
        let Predicate::Bool { must, should } = predicate else {
            panic!("expected bool predicate");
        };
        assert!(should.is_empty());
        assert_eq!(must.len(), 4);
        assert_eq!(
            must[3],
            Predicate::Bool {
                must: vec![],
                should: vec![
                    Predicate::matching(Field::ProposalTitle, "upgrade"),
                    Predicate::matching(Field::ProposalDescription, "upgrade"),
                    Predicate::matching(Field::ProposalId, "upgrade"),
                ],
            }
        );

        // Empty optional filters are omitted.
        let predicate = ProposalQuery {
            dao_id: Some(String::new()),
            content: Some("   ".to_owned()),
            ..query("AELF")
        }
        .predicate()
        .expect("query is valid");
        assert_matches!(predicate, Predicate::Bool { must, .. } if must.len() == 1);
    }

    #[tokio::test]
    async fn test_search() {
        let engine = engine(&[
            document("AELF", "1", "Foo"),
            document("AELF", "2", "Bar"),
            document("tDVV", "3", "Foo"),
        ])
        .await;

        let page = engine
            .search(&ProposalQuery {
                content: Some("Foo".to_owned()),
                ..query("AELF")
            })
            .await
            .expect("search succeeds");
        assert_eq!(page.total_matched, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].proposal_id, "1");

        // Content also matches proposal IDs.
        let page = engine
            .search(&ProposalQuery {
                content: Some("2".to_owned()),
                ..query("AELF")
            })
            .await
            .expect("search succeeds");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].proposal_id, "2");

        let page = engine
            .search(&ProposalQuery {
                proposal_status: Some(ProposalStatus::Approved),
                ..query("AELF")
            })
            .await
            .expect("search succeeds");
        assert_eq!(page.total_matched, 0);
    }

    #[tokio::test]
    async fn test_limit_is_capped() {
        let documents = (0..25)
            .map(|n| document("AELF", &format!("p{n:02}"), "title"))
            .collect::<Vec<_>>();
        let engine = engine(&documents).await;

        let page = engine
            .search(&ProposalQuery {
                limit: 1_000,
                ..query("AELF")
            })
            .await
            .expect("search succeeds");
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total_matched, 25);
    }

    #[tokio::test]
    async fn test_invalid_chain_id() {
        let engine = engine(&[document("AELF", "1", "Foo")]).await;

        assert_matches!(
            engine.search(&query("not a chain")).await,
            Err(QueryError::InvalidChainId(_))
        );
        assert_matches!(
            engine.get_by_id("", "1").await,
            Err(QueryError::InvalidChainId(_))
        );
        assert_matches!(
            engine.count_by_scope("AE0F", "dao").await,
            Err(QueryError::InvalidChainId(_))
        );
    }

    #[tokio::test]
    async fn test_lookups() {
        let engine = engine(&[
            document("AELF", "1", "Foo"),
            document("AELF", "2", "Bar"),
            document("tDVV", "1", "Foo"),
        ])
        .await;

        let document = engine.get_by_id("tDVV", "1").await.expect("lookup succeeds");
        assert_matches!(document, Some(document) if document.id == "tDVV-1");

        let documents = engine
            .get_by_ids("AELF", &["1".to_owned(), "3".to_owned()])
            .await
            .expect("lookup succeeds");
        assert_eq!(documents.len(), 1);
        assert!(documents.contains_key("1"));

        let documents = engine
            .get_by_parent("AELF", "dao")
            .await
            .expect("lookup succeeds");
        assert_eq!(documents.len(), 2);

        let count = engine
            .count_by_scope("AELF", "dao")
            .await
            .expect("count succeeds");
        assert_eq!(count, 2);
    }
}
