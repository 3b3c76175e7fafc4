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

pub mod in_mem;

use crate::{
    domain::{
        self, ChainId, GovernanceMechanism, ProposalDocument, ProposalStage, ProposalStatus,
        ProposalTransaction, ProposalType, SCAN_LIMIT, SearchPage, by_id_predicate,
        by_ids_predicate, by_parent_predicate, excluding_stages_predicate,
        predicate::{Field, Predicate, Sort, SortOrder, Value, fold, match_tokens},
        scan_sort,
    },
    infra::pool::{Db, Pool},
};
use chrono::{DateTime, Utc};
use fastrace::trace;
use itertools::Itertools;
use log::debug;
use sqlx::{FromRow, QueryBuilder};
use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

/// Rows per insert statement; keeps the number of bind parameters within the database limits.
const UPSERT_CHUNK_SIZE: usize = 500;

const COLUMNS: &[&str] = &[
    "id",
    "chain_id",
    "dao_id",
    "proposal_id",
    "block_height",
    "proposal_title",
    "proposal_description",
    "forum_url",
    "proposal_type",
    "proposal_status",
    "proposal_stage",
    "governance_mechanism",
    "proposer",
    "scheme_address",
    "transaction_to_address",
    "transaction_contract_method_name",
    "transaction_params",
    "vote_scheme_id",
    "veto_proposal_id",
    "deploy_time",
    "execute_time",
    "active_start_time",
    "active_end_time",
    "execute_start_time",
    "execute_end_time",
    "minimal_required_threshold",
    "minimal_vote_threshold",
    "minimal_approve_threshold",
    "maximal_rejection_threshold",
    "maximal_abstention_threshold",
    "active_time_period",
    "veto_active_time_period",
    "pending_time_period",
    "execute_time_period",
    "veto_execute_time_period",
    "is_network_dao",
];

/// Text fields in [fold]ed form, written on upsert and only read by match predicates.
const FOLDED_FIELDS: &[Field] = &[
    Field::Id,
    Field::ChainId,
    Field::DaoId,
    Field::ProposalId,
    Field::ProposalTitle,
    Field::ProposalDescription,
];

static WRITE_COLUMNS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    COLUMNS
        .iter()
        .copied()
        .chain(FOLDED_FIELDS.iter().filter_map(Field::folded_column))
        .collect()
});

static SELECT: LazyLock<String> =
    LazyLock::new(|| format!("SELECT {} FROM proposals WHERE ", COLUMNS.join(", ")));

static INSERT: LazyLock<String> =
    LazyLock::new(|| format!("INSERT INTO proposals ({}) ", WRITE_COLUMNS.join(", ")));

static ON_CONFLICT: LazyLock<String> = LazyLock::new(|| {
    let assignments = WRITE_COLUMNS
        .iter()
        .skip(1)
        .map(|column| format!("{column} = excluded.{column}"))
        .join(", ");
    format!(" ON CONFLICT (id) DO UPDATE SET {assignments}")
});

/// Tie-breaker matching the byte-wise ordering of IDs in memory.
#[cfg(feature = "cloud")]
const ID_ORDER: &str = "id COLLATE \"C\" ASC";

/// Tie-breaker matching the byte-wise ordering of IDs in memory.
#[cfg(not(feature = "cloud"))]
const ID_ORDER: &str = "id ASC";

/// Sqlx based [domain::ProposalIndex] implementation; query trees are compiled into SQL.
#[derive(Debug, Clone)]
pub struct SqlxProposalIndex {
    pool: Pool,
}

impl SqlxProposalIndex {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn select(
        &self,
        predicate: &Predicate,
        sort: Sort,
        page: Option<(u64, u64)>,
    ) -> Result<Vec<ProposalDocument>, sqlx::Error> {
        let mut sql = QueryBuilder::<Db>::new(SELECT.as_str());
        push_predicate(&mut sql, predicate);
        push_sort(&mut sql, sort);

        if let Some((skip, limit)) = page {
            sql.push(" LIMIT ")
                .push_bind(to_i64(limit))
                .push(" OFFSET ")
                .push_bind(to_i64(skip));
        }

        sql.build_query_as::<ProposalRow>()
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(ProposalDocument::try_from)
            .collect()
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, sqlx::Error> {
        let mut sql = QueryBuilder::<Db>::new("SELECT COUNT(*) FROM proposals WHERE ");
        push_predicate(&mut sql, predicate);

        let count = sql
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await?;

        Ok(count as u64)
    }
}

impl domain::ProposalIndex for SqlxProposalIndex {
    type Error = sqlx::Error;

    #[trace]
    async fn upsert(&self, documents: &[ProposalDocument]) -> Result<(), Self::Error> {
        if documents.is_empty() {
            return Ok(());
        }

        // A single statement must not affect the same row twice; the last occurrence wins.
        let mut seen = HashSet::new();
        let mut documents = documents
            .iter()
            .rev()
            .filter(|document| seen.insert(document.id.as_str()))
            .collect::<Vec<_>>();
        documents.reverse();

        let mut tx = self.pool.begin().await?;

        for chunk in documents.chunks(UPSERT_CHUNK_SIZE) {
            let mut sql = QueryBuilder::<Db>::new(INSERT.as_str());
            sql.push_values(chunk, |mut row, document| {
                row.push_bind(document.id.clone())
                    .push_bind(document.chain_id.to_string())
                    .push_bind(document.dao_id.clone())
                    .push_bind(document.proposal_id.clone())
                    .push_bind(document.block_height)
                    .push_bind(document.proposal_title.clone())
                    .push_bind(document.proposal_description.clone())
                    .push_bind(document.forum_url.clone())
                    .push_bind(document.proposal_type)
                    .push_bind(document.proposal_status)
                    .push_bind(document.proposal_stage)
                    .push_bind(document.governance_mechanism)
                    .push_bind(document.proposer.clone())
                    .push_bind(document.scheme_address.clone())
                    .push_bind(document.transaction.to_address.clone())
                    .push_bind(document.transaction.contract_method_name.clone())
                    .push_bind(document.transaction.params.clone())
                    .push_bind(document.vote_scheme_id.clone())
                    .push_bind(document.veto_proposal_id.clone())
                    .push_bind(document.deploy_time.timestamp_millis())
                    .push_bind(document.execute_time.timestamp_millis())
                    .push_bind(document.active_start_time.timestamp_millis())
                    .push_bind(document.active_end_time.timestamp_millis())
                    .push_bind(document.execute_start_time.timestamp_millis())
                    .push_bind(document.execute_end_time.timestamp_millis())
                    .push_bind(document.minimal_required_threshold)
                    .push_bind(document.minimal_vote_threshold)
                    .push_bind(document.minimal_approve_threshold)
                    .push_bind(document.maximal_rejection_threshold)
                    .push_bind(document.maximal_abstention_threshold)
                    .push_bind(document.active_time_period)
                    .push_bind(document.veto_active_time_period)
                    .push_bind(document.pending_time_period)
                    .push_bind(document.execute_time_period)
                    .push_bind(document.veto_execute_time_period)
                    .push_bind(document.is_network_dao);

                for field in FOLDED_FIELDS {
                    if let Value::Text(text) = field.value_of(document) {
                        row.push_bind(fold(&text));
                    }
                }
            });
            sql.push(ON_CONFLICT.as_str());

            sql.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(documents = documents.len(); "upserted proposals");

        Ok(())
    }

    #[trace]
    async fn search(
        &self,
        predicate: &Predicate,
        sort: Sort,
        skip: u64,
        limit: u64,
    ) -> Result<SearchPage, Self::Error> {
        let total_matched = self.count(predicate).await?;

        let items = if limit == 0 || skip >= total_matched {
            vec![]
        } else {
            self.select(predicate, sort, Some((skip, limit))).await?
        };

        Ok(SearchPage {
            items,
            total_matched,
        })
    }

    #[trace(properties = { "proposal_id": "{proposal_id}" })]
    async fn get_by_id(
        &self,
        chain_id: &ChainId,
        proposal_id: &str,
    ) -> Result<Option<ProposalDocument>, Self::Error> {
        let predicate = by_id_predicate(chain_id, proposal_id);
        let documents = self.select(&predicate, Sort::default(), Some((0, 1))).await?;

        Ok(documents.into_iter().next())
    }

    #[trace]
    async fn get_by_ids(
        &self,
        chain_id: &ChainId,
        proposal_ids: &[String],
    ) -> Result<HashMap<String, ProposalDocument>, Self::Error> {
        if proposal_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let predicate = by_ids_predicate(chain_id, proposal_ids);
        let documents = self.select(&predicate, Sort::default(), None).await?;

        Ok(documents
            .into_iter()
            .map(|document| (document.proposal_id.clone(), document))
            .collect())
    }

    #[trace]
    async fn get_by_parent(
        &self,
        chain_id: &ChainId,
        dao_id: &str,
    ) -> Result<Vec<ProposalDocument>, Self::Error> {
        let predicate = by_parent_predicate(chain_id, dao_id);
        self.select(&predicate, Sort::default(), None).await
    }

    #[trace]
    async fn count_by_scope(&self, chain_id: &ChainId, dao_id: &str) -> Result<u64, Self::Error> {
        self.count(&by_parent_predicate(chain_id, dao_id)).await
    }

    #[trace]
    async fn scan_excluding(
        &self,
        excluded_stages: &[ProposalStage],
        skip: u64,
    ) -> Result<Vec<ProposalDocument>, Self::Error> {
        let predicate = excluding_stages_predicate(excluded_stages);
        self.select(&predicate, scan_sort(), Some((skip, SCAN_LIMIT)))
            .await
    }
}

/// Append the given query tree as a boolean SQL expression. Values are always bound, never
/// inlined; column names only ever come from [domain::predicate::Field::column].
fn push_predicate(sql: &mut QueryBuilder<'static, Db>, predicate: &Predicate) {
    match predicate {
        Predicate::Term { field, value } => {
            sql.push(field.column()).push(" = ");
            push_value(sql, value);
        }

        Predicate::Terms { values, .. } if values.is_empty() => {
            sql.push("1 = 0");
        }

        Predicate::Terms { field, values } => {
            sql.push(field.column()).push(" IN (");
            let mut separated = sql.separated(", ");
            for value in values {
                match value {
                    Value::Int(n) => separated.push_bind(*n),
                    Value::Text(s) => separated.push_bind(s.clone()),
                };
            }
            separated.push_unseparated(")");
        }

        Predicate::Match { field, query } => {
            let tokens = match_tokens(query).collect::<Vec<_>>();

            match field.folded_column() {
                Some(column) if !tokens.is_empty() => {
                    sql.push("(");
                    for (n, token) in tokens.iter().enumerate() {
                        if n > 0 {
                            sql.push(" OR ");
                        }
                        sql.push(column)
                            .push(" LIKE ")
                            .push_bind(format!("%{}%", escape_like(token)))
                            .push(" ESCAPE '\\'");
                    }
                    sql.push(")");
                }

                _ => {
                    sql.push("1 = 0");
                }
            }
        }

        Predicate::Not(predicate) => {
            sql.push("NOT (");
            push_predicate(sql, predicate);
            sql.push(")");
        }

        Predicate::Bool { must, should } if must.is_empty() && should.is_empty() => {
            sql.push("1 = 1");
        }

        Predicate::Bool { must, should } => {
            sql.push("(");

            for (n, predicate) in must.iter().enumerate() {
                if n > 0 {
                    sql.push(" AND ");
                }
                push_predicate(sql, predicate);
            }

            if !should.is_empty() {
                if !must.is_empty() {
                    sql.push(" AND ");
                }
                sql.push("(");
                for (n, predicate) in should.iter().enumerate() {
                    if n > 0 {
                        sql.push(" OR ");
                    }
                    push_predicate(sql, predicate);
                }
                sql.push(")");
            }

            sql.push(")");
        }
    }
}

fn push_value(sql: &mut QueryBuilder<'static, Db>, value: &Value) {
    match value {
        Value::Int(n) => sql.push_bind(*n),
        Value::Text(s) => sql.push_bind(s.clone()),
    };
}

fn push_sort(sql: &mut QueryBuilder<'static, Db>, sort: Sort) {
    let order = match sort.order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };

    sql.push(" ORDER BY ")
        .push(sort.field.column())
        .push(" ")
        .push(order)
        .push(", ")
        .push(ID_ORDER);
}

fn escape_like(token: &str) -> String {
    token
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Debug, FromRow)]
struct ProposalRow {
    id: String,
    chain_id: String,
    dao_id: String,
    proposal_id: String,
    block_height: i64,
    proposal_title: String,
    proposal_description: String,
    forum_url: String,
    proposal_type: ProposalType,
    proposal_status: ProposalStatus,
    proposal_stage: ProposalStage,
    governance_mechanism: GovernanceMechanism,
    proposer: String,
    scheme_address: String,
    transaction_to_address: String,
    transaction_contract_method_name: String,
    transaction_params: String,
    vote_scheme_id: String,
    veto_proposal_id: String,
    deploy_time: i64,
    execute_time: i64,
    active_start_time: i64,
    active_end_time: i64,
    execute_start_time: i64,
    execute_end_time: i64,
    minimal_required_threshold: i64,
    minimal_vote_threshold: i64,
    minimal_approve_threshold: i64,
    maximal_rejection_threshold: i64,
    maximal_abstention_threshold: i64,
    active_time_period: i64,
    veto_active_time_period: i64,
    pending_time_period: i64,
    execute_time_period: i64,
    veto_execute_time_period: i64,
    is_network_dao: bool,
}

impl TryFrom<ProposalRow> for ProposalDocument {
    type Error = sqlx::Error;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        let chain_id =
            ChainId::try_from(row.chain_id).map_err(|error| sqlx::Error::Decode(error.into()))?;

        Ok(Self {
            id: row.id,
            chain_id,
            dao_id: row.dao_id,
            proposal_id: row.proposal_id,
            block_height: row.block_height,
            proposal_title: row.proposal_title,
            proposal_description: row.proposal_description,
            forum_url: row.forum_url,
            proposal_type: row.proposal_type,
            proposal_status: row.proposal_status,
            proposal_stage: row.proposal_stage,
            governance_mechanism: row.governance_mechanism,
            proposer: row.proposer,
            scheme_address: row.scheme_address,
            transaction: ProposalTransaction {
                to_address: row.transaction_to_address,
                contract_method_name: row.transaction_contract_method_name,
                params: row.transaction_params,
            },
            vote_scheme_id: row.vote_scheme_id,
            veto_proposal_id: row.veto_proposal_id,
            deploy_time: from_millis(row.deploy_time)?,
            execute_time: from_millis(row.execute_time)?,
            active_start_time: from_millis(row.active_start_time)?,
            active_end_time: from_millis(row.active_end_time)?,
            execute_start_time: from_millis(row.execute_start_time)?,
            execute_end_time: from_millis(row.execute_end_time)?,
            minimal_required_threshold: row.minimal_required_threshold,
            minimal_vote_threshold: row.minimal_vote_threshold,
            minimal_approve_threshold: row.minimal_approve_threshold,
            maximal_rejection_threshold: row.maximal_rejection_threshold,
            maximal_abstention_threshold: row.maximal_abstention_threshold,
            active_time_period: row.active_time_period,
            veto_active_time_period: row.veto_active_time_period,
            pending_time_period: row.pending_time_period,
            execute_time_period: row.execute_time_period,
            veto_execute_time_period: row.veto_execute_time_period,
            is_network_dao: row.is_network_dao,
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp {millis} out of range").into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::domain::{
        ChainId, GovernanceMechanism, ProposalDocument, ProposalIndex, ProposalStage,
        ProposalTransaction, ProposalType,
        predicate::{Field, Predicate, QueryFilter, Sort},
    };
    use chrono::DateTime;

    pub fn chain(chain_id: &str) -> ChainId {
        ChainId::try_from(chain_id).expect("chain ID is valid")
    }

    pub fn document(chain_id: &str, proposal_id: &str, block_height: i64) -> ProposalDocument {
        ProposalDocument::new(chain(chain_id), proposal_id, block_height)
    }

    fn proposal_ids(documents: &[ProposalDocument]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.proposal_id.as_str())
            .collect()
    }

    pub async fn upsert_is_idempotent(index: impl ProposalIndex) -> anyhow::Result<()> {
        let mut full = document("AELF", "p1", 7);
        full.dao_id = "dao".to_owned();
        full.proposal_title = "Treasury".to_owned();
        full.proposal_type = ProposalType::Advisory;
        full.proposal_stage = ProposalStage::Execute;
        full.governance_mechanism = GovernanceMechanism::Referendum;
        full.transaction = ProposalTransaction {
            to_address: "to".to_owned(),
            contract_method_name: "Transfer".to_owned(),
            params: "{}".to_owned(),
        };
        full.deploy_time = DateTime::from_timestamp_millis(1_700_000_000_123).expect("valid");
        full.minimal_vote_threshold = 42;
        full.is_network_dao = true;
        let other = document("AELF", "p2", 8);

        index.upsert(&[full.clone(), other.clone()]).await?;
        index.upsert(&[full.clone(), other.clone()]).await?;

        let page = index.search(&Predicate::all(), Sort::default(), 0, 10).await?;
        assert_eq!(page.total_matched, 2);
        assert_eq!(index.get_by_id(&chain("AELF"), "p1").await?, Some(full.clone()));

        // Replacement is by ID and wholesale; within one batch the last occurrence wins.
        let mut first = full.clone();
        first.proposal_title = "First".to_owned();
        let mut last = ProposalDocument::new(chain("AELF"), "p1", 9);
        last.proposal_title = "Last".to_owned();
        index.upsert(&[first, last.clone()]).await?;

        assert_eq!(index.get_by_id(&chain("AELF"), "p1").await?, Some(last));
        let page = index.search(&Predicate::all(), Sort::default(), 0, 10).await?;
        assert_eq!(page.total_matched, 2);

        index.upsert(&[]).await?;

        Ok(())
    }

    pub async fn filters_compose(index: impl ProposalIndex) -> anyhow::Result<()> {
        let mut d1 = document("AELF", "1", 1);
        d1.governance_mechanism = GovernanceMechanism::Parliament;
        d1.proposal_title = "Fund the Node".to_owned();
        let mut d2 = document("AELF", "2", 2);
        d2.governance_mechanism = GovernanceMechanism::Referendum;
        d2.proposal_title = "Fund the Node".to_owned();
        let mut d3 = document("tDVV", "3", 3);
        d3.governance_mechanism = GovernanceMechanism::Parliament;
        d3.proposal_title = "Fund the Node".to_owned();
        let mut d4 = document("AELF", "4", 4);
        d4.governance_mechanism = GovernanceMechanism::Parliament;
        d4.proposal_title = "Something else".to_owned();
        index.upsert(&[d1, d2, d3, d4]).await?;

        let predicate = QueryFilter::new()
            .must(Predicate::term(Field::ChainId, &chain("AELF")))
            .must(Predicate::term(
                Field::GovernanceMechanism,
                GovernanceMechanism::Parliament,
            ))
            .should(Predicate::matching(Field::ProposalTitle, "NODE"))
            .should(Predicate::matching(Field::ProposalDescription, "NODE"))
            .should(Predicate::matching(Field::ProposalId, "NODE"))
            .into_predicate();
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(proposal_ids(&page.items), ["1"]);
        assert_eq!(page.total_matched, 1);

        let predicate = Predicate::terms(Field::ProposalId, Vec::<String>::new());
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(page.total_matched, 0);

        let page = index.search(&predicate.negate(), Sort::default(), 0, 10).await?;
        assert_eq!(page.total_matched, 4);

        let predicate = Predicate::terms(Field::ProposalId, ["2", "3"]);
        let page = index
            .search(&predicate, Sort::ascending(Field::BlockHeight), 0, 10)
            .await?;
        assert_eq!(proposal_ids(&page.items), ["2", "3"]);

        Ok(())
    }

    pub async fn match_is_literal(index: impl ProposalIndex) -> anyhow::Result<()> {
        let mut d1 = document("AELF", "1", 1);
        d1.proposal_title = "Raise fee by 10%".to_owned();
        let mut d2 = document("AELF", "2", 2);
        d2.proposal_title = "Raise fee by 1000".to_owned();
        let mut d3 = document("AELF", "3", 3);
        d3.proposal_title = "snake_case".to_owned();
        let mut d4 = document("AELF", "4", 4);
        d4.proposal_title = "snakeXcase".to_owned();
        let mut d5 = document("AELF", "5", 5);
        d5.proposal_title = "Über Ärger".to_owned();
        index.upsert(&[d1, d2, d3, d4, d5]).await?;

        let predicate = Predicate::matching(Field::ProposalTitle, "0%");
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(proposal_ids(&page.items), ["1"]);

        let predicate = Predicate::matching(Field::ProposalTitle, "E_C");
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(proposal_ids(&page.items), ["3"]);

        let predicate = Predicate::matching(Field::ProposalTitle, "über");
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(proposal_ids(&page.items), ["5"]);

        let predicate = Predicate::matching(Field::ProposalTitle, "ÄRGER");
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(proposal_ids(&page.items), ["5"]);

        let predicate = Predicate::matching(Field::ProposalTitle, "  ");
        let page = index.search(&predicate, Sort::default(), 0, 10).await?;
        assert_eq!(page.total_matched, 0);

        Ok(())
    }

    pub async fn pagination_is_stable(index: impl ProposalIndex) -> anyhow::Result<()> {
        let documents = (0..25)
            .map(|n| {
                let mut document = document("AELF", &format!("p{n:02}"), n);
                // Pairs share a deploy time, hence the ID tie-breaker decides.
                document.deploy_time =
                    DateTime::from_timestamp_millis(1_000 * (n / 2)).expect("valid");
                document
            })
            .collect::<Vec<_>>();
        index.upsert(&documents).await?;

        let mut seen = vec![];
        for (skip, expected_len) in [(0, 10), (10, 10), (20, 5), (25, 0)] {
            let page = index.search(&Predicate::all(), Sort::default(), skip, 10).await?;
            assert_eq!(page.total_matched, 25);
            assert_eq!(page.items.len(), expected_len);
            seen.extend(page.items);
        }

        let mut expected = documents;
        let sort = Sort::default();
        expected.sort_by(|a, b| sort.compare(a, b));
        assert_eq!(seen, expected);
        assert_eq!(seen[0].proposal_id, "p24");
        assert_eq!(seen[1].proposal_id, "p22");
        assert_eq!(seen[2].proposal_id, "p23");

        let page = index.search(&Predicate::all(), Sort::default(), 0, 0).await?;
        assert!(page.items.is_empty());
        assert_eq!(page.total_matched, 25);

        Ok(())
    }

    pub async fn lookups(index: impl ProposalIndex) -> anyhow::Result<()> {
        let mut d1 = document("AELF", "p1", 1);
        d1.dao_id = "dao-a".to_owned();
        let mut d2 = document("AELF", "p2", 2);
        d2.dao_id = "dao-a".to_owned();
        let mut d3 = document("tDVV", "p1", 3);
        d3.dao_id = "dao-a".to_owned();
        let mut d4 = document("AELF", "p4", 4);
        d4.dao_id = "dao-b".to_owned();
        index.upsert(&[d1.clone(), d2, d3.clone(), d4]).await?;

        assert_eq!(index.get_by_id(&chain("tDVV"), "p1").await?, Some(d3));
        assert_eq!(index.get_by_id(&chain("tDVV"), "p2").await?, None);

        let by_ids = index
            .get_by_ids(
                &chain("AELF"),
                &["p1".to_owned(), "p4".to_owned(), "p9".to_owned()],
            )
            .await?;
        assert_eq!(by_ids.len(), 2);
        assert_eq!(by_ids.get("p1"), Some(&d1));
        assert!(index.get_by_ids(&chain("AELF"), &[]).await?.is_empty());

        let by_parent = index.get_by_parent(&chain("AELF"), "dao-a").await?;
        let mut ids = proposal_ids(&by_parent);
        ids.sort();
        assert_eq!(ids, ["p1", "p2"]);

        assert_eq!(index.count_by_scope(&chain("AELF"), "dao-a").await?, 2);
        assert_eq!(index.count_by_scope(&chain("AELF"), "dao-c").await?, 0);

        Ok(())
    }

    pub async fn scan_excludes_stages(index: impl ProposalIndex) -> anyhow::Result<()> {
        let documents = [
            (9, ProposalStage::Active),
            (1, ProposalStage::Default),
            (5, ProposalStage::Pending),
            (7, ProposalStage::Finished),
            (3, ProposalStage::Execute),
        ]
        .into_iter()
        .map(|(block_height, stage)| {
            let mut document = document("AELF", &format!("p{block_height}"), block_height);
            document.proposal_stage = stage;
            document
        })
        .collect::<Vec<_>>();
        index.upsert(&documents).await?;

        let heights = |documents: Vec<ProposalDocument>| {
            documents
                .into_iter()
                .map(|document| document.block_height)
                .collect::<Vec<_>>()
        };

        let scanned = index.scan_excluding(&[ProposalStage::Finished], 0).await?;
        assert_eq!(heights(scanned), [1, 3, 5, 9]);

        let scanned = index.scan_excluding(&[ProposalStage::Finished], 2).await?;
        assert_eq!(heights(scanned), [5, 9]);

        let scanned = index
            .scan_excluding(&[ProposalStage::Finished, ProposalStage::Default], 0)
            .await?;
        assert_eq!(heights(scanned), [3, 5, 9]);

        let scanned = index.scan_excluding(&[], 0).await?;
        assert_eq!(heights(scanned), [1, 3, 5, 7, 9]);

        Ok(())
    }

    #[cfg(not(feature = "cloud"))]
    mod sqlite {
        use crate::infra::{
            migrations,
            pool::sqlite::{Config, SqlitePool},
            proposal_index::{SqlxProposalIndex, tests},
        };

        async fn index() -> anyhow::Result<SqlxProposalIndex> {
            let pool = SqlitePool::new(Config::in_memory()).await?;
            migrations::run(&pool).await?;
            Ok(SqlxProposalIndex::new(pool))
        }

        #[tokio::test]
        async fn test_upsert_is_idempotent() -> anyhow::Result<()> {
            tests::upsert_is_idempotent(index().await?).await
        }

        #[tokio::test]
        async fn test_filters_compose() -> anyhow::Result<()> {
            tests::filters_compose(index().await?).await
        }

        #[tokio::test]
        async fn test_match_is_literal() -> anyhow::Result<()> {
            tests::match_is_literal(index().await?).await
        }

        #[tokio::test]
        async fn test_pagination_is_stable() -> anyhow::Result<()> {
            tests::pagination_is_stable(index().await?).await
        }

        #[tokio::test]
        async fn test_lookups() -> anyhow::Result<()> {
            tests::lookups(index().await?).await
        }

        #[tokio::test]
        async fn test_scan_excludes_stages() -> anyhow::Result<()> {
            tests::scan_excludes_stages(index().await?).await
        }
    }

    #[cfg(feature = "cloud")]
    mod postgres {
        use crate::infra::{
            migrations,
            pool::postgres::{Config, PostgresPool},
            proposal_index::{SqlxProposalIndex, tests},
        };
        use anyhow::Context;
        use sqlx::postgres::PgSslMode;
        use std::time::Duration;
        use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
        use testcontainers_modules::postgres::Postgres;

        /// The container must outlive the index.
        async fn index() -> anyhow::Result<(ContainerAsync<Postgres>, SqlxProposalIndex)> {
            let postgres_container = Postgres::default()
                .with_db_name("proposals")
                .with_user("indexer")
                .with_password("indexer")
                .with_tag("17.1-alpine")
                .start()
                .await
                .context("start Postgres container")?;
            let postgres_port = postgres_container
                .get_host_port_ipv4(5432)
                .await
                .context("get Postgres port")?;

            let config = Config {
                host: "localhost".to_string(),
                port: postgres_port,
                dbname: "proposals".to_string(),
                user: "indexer".to_string(),
                password: "indexer".into(),
                sslmode: PgSslMode::Prefer,
                max_connections: 10,
                idle_timeout: Duration::from_secs(60),
                max_lifetime: Duration::from_secs(5 * 60),
            };
            let pool = PostgresPool::new(config).await?;
            migrations::run(&pool).await?;

            Ok((postgres_container, SqlxProposalIndex::new(pool)))
        }

        #[tokio::test]
        async fn test_upsert_is_idempotent() -> anyhow::Result<()> {
            let (_container, index) = index().await?;
            tests::upsert_is_idempotent(index).await
        }

        #[tokio::test]
        async fn test_filters_compose() -> anyhow::Result<()> {
            let (_container, index) = index().await?;
            tests::filters_compose(index).await
        }

        #[tokio::test]
        async fn test_match_is_literal() -> anyhow::Result<()> {
            let (_container, index) = index().await?;
            tests::match_is_literal(index).await
        }

        #[tokio::test]
        async fn test_pagination_is_stable() -> anyhow::Result<()> {
            let (_container, index) = index().await?;
            tests::pagination_is_stable(index).await
        }

        #[tokio::test]
        async fn test_lookups() -> anyhow::Result<()> {
            let (_container, index) = index().await?;
            tests::lookups(index).await
        }

        #[tokio::test]
        async fn test_scan_excludes_stages() -> anyhow::Result<()> {
            let (_container, index) = index().await?;
            tests::scan_excludes_stages(index).await
        }
    }
}
