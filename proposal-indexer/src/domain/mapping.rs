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

use crate::domain::{RawEnum, RawProposalRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexer_common::domain::{
    ChainId, InvalidChainIdError, ProposalDocument, ProposalTransaction, UnknownVariantError,
};
use std::str::FromStr;
use thiserror::Error;

/// Reasons a source record cannot be projected onto a [ProposalDocument].
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error(transparent)]
    InvalidChainId(#[from] InvalidChainIdError),

    #[error("record of chain {actual} received for chain {expected}")]
    ForeignChain { expected: ChainId, actual: ChainId },

    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariantError),

    #[error("invalid {field} {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

impl RawProposalRecord {
    /// Field-for-field projection onto a [ProposalDocument] of the given chain. Absent optional
    /// fields become their zero values; the document ID is always derived from chain and
    /// proposal ID.
    pub fn into_document(self, chain_id: &ChainId) -> Result<ProposalDocument, MappingError> {
        let block_height = self.block_height.ok_or(MappingError::Missing("blockHeight"))?;
        let proposal_id = self
            .proposal_id
            .filter(|proposal_id| !proposal_id.is_empty())
            .ok_or(MappingError::Missing("proposalId"))?;

        if let Some(actual) = self.chain_id.filter(|chain_id| !chain_id.is_empty()) {
            let actual = ChainId::try_from(actual)?;
            if actual != *chain_id {
                return Err(MappingError::ForeignChain {
                    expected: chain_id.to_owned(),
                    actual,
                });
            }
        }

        let transaction = self.transaction.unwrap_or_default();

        Ok(ProposalDocument {
            id: ProposalDocument::document_id(chain_id, &proposal_id),
            chain_id: chain_id.to_owned(),
            dao_id: self.dao_id.unwrap_or_default(),
            proposal_id,
            block_height,
            proposal_title: self.proposal_title.unwrap_or_default(),
            proposal_description: self.proposal_description.unwrap_or_default(),
            forum_url: self.forum_url.unwrap_or_default(),
            proposal_type: variant(self.proposal_type)?,
            proposal_status: variant(self.proposal_status)?,
            proposal_stage: variant(self.proposal_stage)?,
            governance_mechanism: variant(self.governance_mechanism)?,
            proposer: self.proposer.unwrap_or_default(),
            scheme_address: self.scheme_address.unwrap_or_default(),
            transaction: ProposalTransaction {
                to_address: transaction.to_address.unwrap_or_default(),
                contract_method_name: transaction.contract_method_name.unwrap_or_default(),
                params: transaction.params.unwrap_or_default(),
            },
            vote_scheme_id: self.vote_scheme_id.unwrap_or_default(),
            veto_proposal_id: self.veto_proposal_id.unwrap_or_default(),
            deploy_time: timestamp("deployTime", self.deploy_time)?,
            execute_time: timestamp("executeTime", self.execute_time)?,
            active_start_time: timestamp("activeStartTime", self.active_start_time)?,
            active_end_time: timestamp("activeEndTime", self.active_end_time)?,
            execute_start_time: timestamp("executeStartTime", self.execute_start_time)?,
            execute_end_time: timestamp("executeEndTime", self.execute_end_time)?,
            minimal_required_threshold: self.minimal_required_threshold.unwrap_or_default(),
            minimal_vote_threshold: self.minimal_vote_threshold.unwrap_or_default(),
            minimal_approve_threshold: self.minimal_approve_threshold.unwrap_or_default(),
            maximal_rejection_threshold: self.maximal_rejection_threshold.unwrap_or_default(),
            maximal_abstention_threshold: self.maximal_abstention_threshold.unwrap_or_default(),
            active_time_period: self.active_time_period.unwrap_or_default(),
            veto_active_time_period: self.veto_active_time_period.unwrap_or_default(),
            pending_time_period: self.pending_time_period.unwrap_or_default(),
            execute_time_period: self.execute_time_period.unwrap_or_default(),
            veto_execute_time_period: self.veto_execute_time_period.unwrap_or_default(),
            is_network_dao: self.is_network_dao.unwrap_or_default(),
        })
    }
}

fn variant<T>(value: Option<RawEnum>) -> Result<T, UnknownVariantError>
where
    T: Default + FromStr<Err = UnknownVariantError>,
{
    match value {
        None => Ok(T::default()),
        Some(RawEnum::Code(code)) => code.to_string().parse(),
        Some(RawEnum::Name(name)) => name.parse(),
    }
}

/// RFC 3339, or an ISO 8601 date-time without offset taken as UTC.
fn timestamp(field: &'static str, value: Option<String>) -> Result<DateTime<Utc>, MappingError> {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return Ok(DateTime::<Utc>::UNIX_EPOCH);
    };

    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.to_utc())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|timestamp| timestamp.and_utc())
        })
        .map_err(|_| MappingError::InvalidTimestamp { field, value })
}

#[cfg(test)]
mod tests {
    use crate::domain::{MappingError, RawEnum, RawProposalRecord};
    use assert_matches::assert_matches;
    use chrono::{DateTime, Utc};
    use indexer_common::domain::{
        ChainId, GovernanceMechanism, ProposalStage, ProposalStatus, ProposalType,
    };

    fn aelf() -> ChainId {
        ChainId::try_from("AELF").expect("chain ID is valid")
    }

    fn record(proposal_id: &str, block_height: i64) -> RawProposalRecord {
        RawProposalRecord {
            proposal_id: Some(proposal_id.to_owned()),
            block_height: Some(block_height),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_document() {
        let record = RawProposalRecord {
            id: Some("ignored".to_owned()),
            chain_id: Some("AELF".to_owned()),
            dao_id: Some("dao".to_owned()),
            proposal_title: Some("Title".to_owned()),
            proposal_type: Some(RawEnum::Name("advisory".to_owned())),
            proposal_status: Some(RawEnum::Code(2)),
            governance_mechanism: Some(RawEnum::Name("Referendum".to_owned())),
            deploy_time: Some("2024-05-01T12:00:00.5Z".to_owned()),
            execute_time: Some("2024-05-02T08:30:00".to_owned()),
            pending_time_period: Some(3_600),
            ..record("p1", 12)
        };

        let document = record.into_document(&aelf()).expect("record can be mapped");

        assert_eq!(document.id, "AELF-p1");
        assert_eq!(document.block_height, 12);
        assert_eq!(document.dao_id, "dao");
        assert_eq!(document.proposal_type, ProposalType::Advisory);
        assert_eq!(document.proposal_status, ProposalStatus::Approved);
        assert_eq!(document.proposal_stage, ProposalStage::Default);
        assert_eq!(document.governance_mechanism, GovernanceMechanism::Referendum);
        assert_eq!(document.deploy_time.timestamp_millis(), 1_714_564_800_500);
        assert_eq!(document.execute_time.timestamp(), 1_714_638_600);
        assert_eq!(document.active_start_time, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(document.pending_time_period, 3_600);
        assert_eq!(document.transaction.params, "");
        assert!(!document.is_network_dao);
    }

    #[test]
    fn test_into_document_errors() {
        let missing_height = RawProposalRecord {
            block_height: None,
            ..record("p1", 0)
        };
        assert_matches!(
            missing_height.into_document(&aelf()),
            Err(MappingError::Missing("blockHeight"))
        );

        assert_matches!(
            record("", 1).into_document(&aelf()),
            Err(MappingError::Missing("proposalId"))
        );

        let foreign = RawProposalRecord {
            chain_id: Some("tDVV".to_owned()),
            ..record("p1", 1)
        };
        assert_matches!(
            foreign.into_document(&aelf()),
            Err(MappingError::ForeignChain { .. })
        );

        let unknown_stage = RawProposalRecord {
            proposal_stage: Some(RawEnum::Name("Limbo".to_owned())),
            ..record("p1", 1)
        };
        assert_matches!(
            unknown_stage.into_document(&aelf()),
            Err(MappingError::UnknownVariant(_))
        );

        let bad_time = RawProposalRecord {
            deploy_time: Some("yesterday".to_owned()),
            ..record("p1", 1)
        };
        assert_matches!(
            bad_time.into_document(&aelf()),
            Err(MappingError::InvalidTimestamp { field: "deployTime", .. })
        );
    }
}
