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

//! Boolean query trees over [ProposalDocument] fields. A [Predicate] is built once per request and
//! then either compiled to SQL by the storage adapter or evaluated in memory via
//! [Predicate::matches]; both must agree.

use crate::domain::{
    ChainId, GovernanceMechanism, ProposalDocument, ProposalStage, ProposalStatus, ProposalType,
};
use std::cmp::Ordering;

/// A queryable document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    ChainId,
    DaoId,
    ProposalId,
    ProposalTitle,
    ProposalDescription,
    ProposalType,
    ProposalStatus,
    ProposalStage,
    GovernanceMechanism,
    BlockHeight,
    DeployTime,
}

impl Field {
    /// The column name of this field.
    pub fn column(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::ChainId => "chain_id",
            Field::DaoId => "dao_id",
            Field::ProposalId => "proposal_id",
            Field::ProposalTitle => "proposal_title",
            Field::ProposalDescription => "proposal_description",
            Field::ProposalType => "proposal_type",
            Field::ProposalStatus => "proposal_status",
            Field::ProposalStage => "proposal_stage",
            Field::GovernanceMechanism => "governance_mechanism",
            Field::BlockHeight => "block_height",
            Field::DeployTime => "deploy_time",
        }
    }

    /// The column holding the [fold]ed value of this field; only text fields have one and only
    /// text fields can be matched.
    pub fn folded_column(&self) -> Option<&'static str> {
        match self {
            Field::Id => Some("id_folded"),
            Field::ChainId => Some("chain_id_folded"),
            Field::DaoId => Some("dao_id_folded"),
            Field::ProposalId => Some("proposal_id_folded"),
            Field::ProposalTitle => Some("proposal_title_folded"),
            Field::ProposalDescription => Some("proposal_description_folded"),
            _ => None,
        }
    }

    /// The value of this field for the given document. Timestamps are UNIX milliseconds.
    pub fn value_of(&self, document: &ProposalDocument) -> Value {
        match self {
            Field::Id => Value::Text(document.id.clone()),
            Field::ChainId => Value::Text(document.chain_id.to_string()),
            Field::DaoId => Value::Text(document.dao_id.clone()),
            Field::ProposalId => Value::Text(document.proposal_id.clone()),
            Field::ProposalTitle => Value::Text(document.proposal_title.clone()),
            Field::ProposalDescription => Value::Text(document.proposal_description.clone()),
            Field::ProposalType => document.proposal_type.into(),
            Field::ProposalStatus => document.proposal_status.into(),
            Field::ProposalStage => document.proposal_stage.into(),
            Field::GovernanceMechanism => document.governance_mechanism.into(),
            Field::BlockHeight => Value::Int(document.block_height),
            Field::DeployTime => Value::Int(document.deploy_time.timestamp_millis()),
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&ChainId> for Value {
    fn from(chain_id: &ChainId) -> Self {
        Value::Text(chain_id.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

macro_rules! value_from_enum {
    ($($name:ident),+) => {
        $(
            impl From<$name> for Value {
                fn from(variant: $name) -> Self {
                    Value::Int(variant.code())
                }
            }
        )+
    };
}

value_from_enum!(GovernanceMechanism, ProposalType, ProposalStatus, ProposalStage);

/// A node of a boolean query tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The field equals the value.
    Term { field: Field, value: Value },

    /// The field equals any of the values; never matches if there are none.
    Terms { field: Field, values: Vec<Value> },

    /// The text field contains any of the whitespace separated tokens of the query, ignoring
    /// case; never matches if the query has no tokens.
    Match { field: Field, query: String },

    /// Negation.
    Not(Box<Predicate>),

    /// All `must` predicates hold and, unless `should` is empty, at least one of `should` holds.
    Bool {
        must: Vec<Predicate>,
        should: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn term(field: Field, value: impl Into<Value>) -> Self {
        Predicate::Term {
            field,
            value: value.into(),
        }
    }

    pub fn terms<V>(field: Field, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        Predicate::Terms {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matching(field: Field, query: impl Into<String>) -> Self {
        Predicate::Match {
            field,
            query: query.into(),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// A predicate matching every document.
    pub fn all() -> Self {
        Predicate::Bool {
            must: vec![],
            should: vec![],
        }
    }

    /// Evaluate this predicate against the given document.
    pub fn matches(&self, document: &ProposalDocument) -> bool {
        match self {
            Predicate::Term { field, value } => field.value_of(document) == *value,

            Predicate::Terms { field, values } => {
                let actual = field.value_of(document);
                values.iter().any(|value| *value == actual)
            }

            Predicate::Match { field, query } => match field.value_of(document) {
                Value::Text(text) => {
                    let text = fold(&text);
                    match_tokens(query).any(|token| text.contains(&token))
                }
                Value::Int(_) => false,
            },

            Predicate::Not(predicate) => !predicate.matches(document),

            Predicate::Bool { must, should } => {
                must.iter().all(|predicate| predicate.matches(document))
                    && (should.is_empty() || should.iter().any(|p| p.matches(document)))
            }
        }
    }
}

/// Case folding applied to matched text and to match tokens alike. Stored in the folded columns
/// at upsert time, so SQL never folds itself.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// The [fold]ed, whitespace separated tokens of a match query.
pub fn match_tokens(query: &str) -> impl Iterator<Item = String> + '_ {
    query.split_whitespace().map(fold)
}

/// Per-request composition of must-clauses and a single should-group, see
/// [QueryFilter::into_predicate].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    must: Vec<Predicate>,
    should: Vec<Predicate>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a must-clause.
    pub fn must(mut self, predicate: Predicate) -> Self {
        self.must.push(predicate);
        self
    }

    /// Add a must-clause if present. Absent optional filters are omitted entirely.
    pub fn must_opt(self, predicate: Option<Predicate>) -> Self {
        match predicate {
            Some(predicate) => self.must(predicate),
            None => self,
        }
    }

    /// Add a branch to the should-group.
    pub fn should(mut self, predicate: Predicate) -> Self {
        self.should.push(predicate);
        self
    }

    /// Build the immutable query tree `(must1 AND ...) AND (should1 OR ...)`; the should-group is
    /// omitted if it has no branches.
    pub fn into_predicate(self) -> Predicate {
        let QueryFilter { mut must, should } = self;

        if !should.is_empty() {
            must.push(Predicate::Bool {
                must: vec![],
                should,
            });
        }

        Predicate::Bool {
            must,
            should: vec![],
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort order. Documents with equal sort keys are always ordered by ID ascending, which
/// keeps pagination stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: Field,
    pub order: SortOrder,
}

impl Sort {
    pub fn ascending(field: Field) -> Self {
        Self {
            field,
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(field: Field) -> Self {
        Self {
            field,
            order: SortOrder::Descending,
        }
    }

    /// Compare two documents by this sort, including the ID tie-breaker.
    pub fn compare(&self, a: &ProposalDocument, b: &ProposalDocument) -> Ordering {
        let ordering = self.field.value_of(a).cmp(&self.field.value_of(b));
        let ordering = match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };

        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

impl Default for Sort {
    /// Most recently deployed first.
    fn default() -> Self {
        Self::descending(Field::DeployTime)
    }
}
