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

use crate::domain::ChainId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Defines an integer-backed proposal enum, stored by its discriminant and parsable from its
/// variant name (case-insensitive) or its discriminant.
macro_rules! proposal_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[repr(i32)]
        pub enum $name {
            #[default]
            $($variant = $code),+
        }

        impl $name {
            pub const ALL: &[Self] = &[$(Self::$variant),+];

            /// The name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }

            /// The variant for the given discriminant, if any.
            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// The discriminant of this variant.
            pub fn code(&self) -> i64 {
                *self as i64
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariantError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(s))
                    .or_else(|| s.parse::<i64>().ok().and_then(Self::from_code))
                    .ok_or_else(|| UnknownVariantError {
                        enum_name: stringify!($name),
                        value: s.to_owned(),
                    })
            }
        }
    };
}

proposal_enum! {
    /// How a DAO makes decisions.
    GovernanceMechanism {
        Unspecified = 0,
        Parliament = 1,
        Association = 2,
        Customize = 3,
        Referendum = 4,
    }
}

proposal_enum! {
    ProposalType {
        Unspecified = 0,
        Governance = 1,
        Advisory = 2,
        Veto = 3,
    }
}

proposal_enum! {
    ProposalStatus {
        Empty = 0,
        PendingVote = 1,
        Approved = 2,
        Rejected = 3,
        Abstained = 4,
        BelowThreshold = 5,
        Challenged = 6,
        Vetoed = 7,
        Executed = 8,
        Expired = 9,
    }
}

proposal_enum! {
    /// Lifecycle stage of a proposal; anything but `Finished` is still subject to sweeps.
    ProposalStage {
        Default = 0,
        Active = 1,
        Pending = 2,
        Execute = 3,
        Finished = 4,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {enum_name} variant {value}")]
pub struct UnknownVariantError {
    pub enum_name: &'static str,
    pub value: String,
}

/// The call a proposal executes once approved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalTransaction {
    pub to_address: String,
    pub contract_method_name: String,
    pub params: String,
}

/// An indexed governance proposal. The index exclusively owns these documents; the sync engine is
/// the sole writer and replaces them as a whole by [ProposalDocument::id].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDocument {
    pub id: String,
    pub chain_id: ChainId,
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

impl ProposalDocument {
    /// The document ID for the given chain and proposal.
    pub fn document_id(chain_id: &ChainId, proposal_id: &str) -> String {
        format!("{chain_id}-{proposal_id}")
    }

    /// A document with the given identity and all other fields at their zero values.
    pub fn new(chain_id: ChainId, proposal_id: impl Into<String>, block_height: i64) -> Self {
        let proposal_id = proposal_id.into();

        Self {
            id: Self::document_id(&chain_id, &proposal_id),
            chain_id,
            dao_id: Default::default(),
            proposal_id,
            block_height,
            proposal_title: Default::default(),
            proposal_description: Default::default(),
            forum_url: Default::default(),
            proposal_type: Default::default(),
            proposal_status: Default::default(),
            proposal_stage: Default::default(),
            governance_mechanism: Default::default(),
            proposer: Default::default(),
            scheme_address: Default::default(),
            transaction: Default::default(),
            vote_scheme_id: Default::default(),
            veto_proposal_id: Default::default(),
            deploy_time: DateTime::<Utc>::UNIX_EPOCH,
            execute_time: DateTime::<Utc>::UNIX_EPOCH,
            active_start_time: DateTime::<Utc>::UNIX_EPOCH,
            active_end_time: DateTime::<Utc>::UNIX_EPOCH,
            execute_start_time: DateTime::<Utc>::UNIX_EPOCH,
            execute_end_time: DateTime::<Utc>::UNIX_EPOCH,
            minimal_required_threshold: Default::default(),
            minimal_vote_threshold: Default::default(),
            minimal_approve_threshold: Default::default(),
            maximal_rejection_threshold: Default::default(),
            maximal_abstention_threshold: Default::default(),
            active_time_period: Default::default(),
            veto_active_time_period: Default::default(),
            pending_time_period: Default::default(),
            execute_time_period: Default::default(),
            veto_execute_time_period: Default::default(),
            is_network_dao: Default::default(),
        }
    }
}
