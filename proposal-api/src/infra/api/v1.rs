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

mod proposal;

pub use proposal::*;

use crate::{
    domain::QueryEngine,
    infra::api::{ApiResult, ContextExt},
};
use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Schema};
use async_graphql_axum::GraphQL;
use axum::{Router, routing::post_service};
use fastrace::trace;
use indexer_common::domain::{self, ProposalIndex};
use metrics::{Counter, counter};
use std::marker::PhantomData;

pub type ProposalSchema<I> = Schema<Query<I>, EmptyMutation, EmptySubscription>;

pub fn make_app<I, S>(engine: QueryEngine<I>, max_complexity: usize, max_depth: usize) -> Router<S>
where
    I: ProposalIndex,
    S: Clone + Send + Sync + 'static,
{
    let schema = schema(engine, max_complexity, max_depth);
    Router::new().route("/graphql", post_service(GraphQL::new(schema)))
}

pub fn schema<I>(engine: QueryEngine<I>, max_complexity: usize, max_depth: usize) -> ProposalSchema<I>
where
    I: ProposalIndex,
{
    Schema::build(Query::<I>::default(), EmptyMutation, EmptySubscription)
        .data(engine)
        .limit_complexity(max_complexity)
        .limit_depth(max_depth)
        .limit_recursive_depth(max_depth)
        .finish()
}

/// GraphQL queries.
pub struct Query<I> {
    proposals_calls: Counter,
    proposal_calls: Counter,
    proposals_by_ids_calls: Counter,
    dao_proposals_calls: Counter,
    proposal_count_calls: Counter,
    unfinished_proposals_calls: Counter,
    _i: PhantomData<I>,
}

impl<I> Default for Query<I> {
    fn default() -> Self {
        let proposals_calls = counter!("proposal_api_calls", "query" => "proposals");
        let proposal_calls = counter!("proposal_api_calls", "query" => "proposal");
        let proposals_by_ids_calls = counter!("proposal_api_calls", "query" => "proposals_by_ids");
        let dao_proposals_calls = counter!("proposal_api_calls", "query" => "dao_proposals");
        let proposal_count_calls = counter!("proposal_api_calls", "query" => "proposal_count");
        let unfinished_proposals_calls =
            counter!("proposal_api_calls", "query" => "unfinished_proposals");

        Self {
            proposals_calls,
            proposal_calls,
            proposals_by_ids_calls,
            dao_proposals_calls,
            proposal_count_calls,
            unfinished_proposals_calls,
            _i: PhantomData,
        }
    }
}

#[Object]
impl<I> Query<I>
where
    I: ProposalIndex,
{
    /// Search the proposals of a chain, most recently deployed first.
    #[trace]
    async fn proposals(
        &self,
        cx: &Context<'_>,
        input: ProposalsInput,
    ) -> ApiResult<ProposalPage> {
        self.proposals_calls.increment(1);

        let page = cx.get_engine::<I>().search(&input.into()).await?;
        Ok(page.into())
    }

    /// Find the proposal with the given ID.
    #[trace(properties = { "chain_id": "{chain_id}", "proposal_id": "{proposal_id}" })]
    async fn proposal(
        &self,
        cx: &Context<'_>,
        chain_id: String,
        proposal_id: String,
    ) -> ApiResult<Option<Proposal>> {
        self.proposal_calls.increment(1);

        let proposal = cx
            .get_engine::<I>()
            .get_by_id(&chain_id, &proposal_id)
            .await?;
        Ok(proposal.map(Into::into))
    }

    /// Find the proposals with the given IDs, in the given order; unknown IDs are left out.
    #[trace(properties = { "chain_id": "{chain_id}" })]
    async fn proposals_by_ids(
        &self,
        cx: &Context<'_>,
        chain_id: String,
        proposal_ids: Vec<String>,
    ) -> ApiResult<Vec<Proposal>> {
        self.proposals_by_ids_calls.increment(1);

        let mut proposals = cx
            .get_engine::<I>()
            .get_by_ids(&chain_id, &proposal_ids)
            .await?;

        let proposals = proposal_ids
            .iter()
            .filter_map(|proposal_id| proposals.remove(proposal_id))
            .map(Into::into)
            .collect();
        Ok(proposals)
    }

    /// All proposals of the given DAO.
    #[trace(properties = { "chain_id": "{chain_id}", "dao_id": "{dao_id}" })]
    async fn dao_proposals(
        &self,
        cx: &Context<'_>,
        chain_id: String,
        dao_id: String,
    ) -> ApiResult<Vec<Proposal>> {
        self.dao_proposals_calls.increment(1);

        let proposals = cx
            .get_engine::<I>()
            .get_by_parent(&chain_id, &dao_id)
            .await?;
        Ok(proposals.into_iter().map(Into::into).collect())
    }

    /// The number of proposals of the given DAO.
    #[trace(properties = { "chain_id": "{chain_id}", "dao_id": "{dao_id}" })]
    async fn proposal_count(
        &self,
        cx: &Context<'_>,
        chain_id: String,
        dao_id: String,
    ) -> ApiResult<u64> {
        self.proposal_count_calls.increment(1);

        let count = cx
            .get_engine::<I>()
            .count_by_scope(&chain_id, &dao_id)
            .await?;
        Ok(count)
    }

    /// Up to 1000 proposals not in any of the excluded stages, lowest block height first.
    #[trace]
    async fn unfinished_proposals(
        &self,
        cx: &Context<'_>,
        #[graphql(default_with = "vec![ProposalStage::Finished]")] excluded_stages: Vec<
            ProposalStage,
        >,
        #[graphql(default)] skip: u64,
    ) -> ApiResult<Vec<Proposal>> {
        self.unfinished_proposals_calls.increment(1);

        let excluded_stages = excluded_stages
            .into_iter()
            .map(domain::ProposalStage::from)
            .collect::<Vec<_>>();

        let proposals = cx
            .get_engine::<I>()
            .scan_excluding(&excluded_stages, skip)
            .await?;
        Ok(proposals.into_iter().map(Into::into).collect())
    }
}
