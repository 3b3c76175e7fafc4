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

use crate::domain::ProposalQuery;
use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use indexer_common::domain::{self, ProposalDocument, SearchPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(remote = "indexer_common::domain::GovernanceMechanism")]
pub enum GovernanceMechanism {
    Unspecified,
    Parliament,
    Association,
    Customize,
    Referendum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(remote = "indexer_common::domain::ProposalType")]
pub enum ProposalType {
    Unspecified,
    Governance,
    Advisory,
    Veto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(remote = "indexer_common::domain::ProposalStatus")]
pub enum ProposalStatus {
    Empty,
    PendingVote,
    Approved,
    Rejected,
    Abstained,
    BelowThreshold,
    Challenged,
    Vetoed,
    Executed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(remote = "indexer_common::domain::ProposalStage")]
pub enum ProposalStage {
    Default,
    Active,
    Pending,
    Execute,
    Finished,
}

/// Search input; absent filters do not restrict the result.
#[derive(Debug, Clone, InputObject)]
pub struct ProposalsInput {
    pub chain_id: String,
    pub dao_id: Option<String>,
    pub governance_mechanism: Option<GovernanceMechanism>,
    pub proposal_type: Option<ProposalType>,
    pub proposal_status: Option<ProposalStatus>,

    /// Matched against title, description and proposal ID; any whitespace separated word
    /// matches, ignoring case.
    pub content: Option<String>,

    #[graphql(default)]
    pub skip: u64,

    #[graphql(default = 20)]
    pub limit: u64,
}

impl From<ProposalsInput> for ProposalQuery {
    fn from(input: ProposalsInput) -> Self {
        let ProposalsInput {
            chain_id,
            dao_id,
            governance_mechanism,
            proposal_type,
            proposal_status,
            content,
            skip,
            limit,
        } = input;

        ProposalQuery {
            chain_id,
            dao_id,
            governance_mechanism: governance_mechanism.map(Into::into),
            proposal_type: proposal_type.map(Into::into),
            proposal_status: proposal_status.map(Into::into),
            content,
            skip,
            limit,
        }
    }
}

/// A page of proposals.
#[derive(Debug, Clone, SimpleObject)]
pub struct ProposalPage {
    pub items: Vec<Proposal>,

    /// The number of all matching proposals.
    pub total_count: u64,
}

impl From<SearchPage> for ProposalPage {
    fn from(page: SearchPage) -> Self {
        ProposalPage {
            items: page.items.into_iter().map(Into::into).collect(),
            total_count: page.total_matched,
        }
    }
}

/// The call a proposal executes once approved.
#[derive(Debug, Clone, SimpleObject)]
pub struct ProposalTransaction {
    pub to_address: String,
    pub contract_method_name: String,
    pub params: String,
}

/// A governance proposal.
#[derive(Debug, Clone, SimpleObject)]
pub struct Proposal {
    pub id: String,
    pub chain_id: String,
    pub dao_id: String,
    pub proposal_id: String,
    pub block_height: i64,
    pub proposal_title: String,
    pub proposal_description: String,
    pub forum_url: String,
    pub proposal_type: ProposalType,
    pub proposal_status: ProposalStatus,
    pub proposal_stage: ProposalStage,
    pub governance_mechanism: GovernanceMechanism,
    pub proposer: String,
    pub scheme_address: String,
    pub transaction: ProposalTransaction,
    pub vote_scheme_id: String,
    pub veto_proposal_id: String,
    pub deploy_time: DateTime<Utc>,
    pub execute_time: DateTime<Utc>,
    pub active_start_time: DateTime<Utc>,
    pub active_end_time: DateTime<Utc>,
    pub execute_start_time: DateTime<Utc>,
    pub execute_end_time: DateTime<Utc>,
    pub minimal_required_threshold: i64,
    pub minimal_vote_threshold: i64,
    pub minimal_approve_threshold: i64,
    pub maximal_rejection_threshold: i64,
    pub maximal_abstention_threshold: i64,
    pub active_time_period: i64,
    pub veto_active_time_period: i64,
    pub pending_time_period: i64,
    pub execute_time_period: i64,
    pub veto_execute_time_period: i64,
    pub is_network_dao: bool,
}

impl From<ProposalDocument> for Proposal {
    fn from(document: ProposalDocument) -> Self {
        let ProposalDocument {
            id,
            chain_id,
            dao_id,
            proposal_id,
            block_height,
            proposal_title,
            proposal_description,
            forum_url,
            proposal_type,
            proposal_status,
            proposal_stage,
            governance_mechanism,
            proposer,
            scheme_address,
            transaction:
                domain::ProposalTransaction {
                    to_address,
                    contract_method_name,
                    params,
                },
            vote_scheme_id,
            veto_proposal_id,
            deploy_time,
            execute_time,
            active_start_time,
            active_end_time,
            execute_start_time,
            execute_end_time,
            minimal_required_threshold,
            minimal_vote_threshold,
            minimal_approve_threshold,
            maximal_rejection_threshold,
            maximal_abstention_threshold,
            active_time_period,
            veto_active_time_period,
            pending_time_period,
            execute_time_period,
            veto_execute_time_period,
            is_network_dao,
        } = document;

        Proposal {
            id,
            chain_id: chain_id.into(),
            dao_id,
            proposal_id,
            block_height,
            proposal_title,
            proposal_description,
            forum_url,
            proposal_type: proposal_type.into(),
            proposal_status: proposal_status.into(),
            proposal_stage: proposal_stage.into(),
            governance_mechanism: governance_mechanism.into(),
            proposer,
            scheme_address,
            transaction: ProposalTransaction {
                to_address,
                contract_method_name,
                params,
            },
            vote_scheme_id,
            veto_proposal_id,
            deploy_time,
            execute_time,
            active_start_time,
            active_end_time,
            execute_start_time,
            execute_end_time,
            minimal_required_threshold,
            minimal_vote_threshold,
            minimal_approve_threshold,
            maximal_rejection_threshold,
            maximal_abstention_threshold,
            active_time_period,
            veto_active_time_period,
            pending_time_period,
            execute_time_period,
            veto_execute_time_period,
            is_network_dao,
        }
    }
}
