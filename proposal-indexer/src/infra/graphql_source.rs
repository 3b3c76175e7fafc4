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

use crate::domain::{RawProposalRecord, Source, SourceRecord, SyncRange};
use fastrace::trace;
use graphql_client::{QueryBody, Response};
use indexer_common::domain::ChainId;
use indoc::indoc;
use log::debug;
use reqwest::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const SYNC_STATE_QUERY: &str = indoc! {"
    query SyncState($chainId: String!, $filterType: BlockFilterType!) {
        syncState(input: { chainId: $chainId, filterType: $filterType }) {
            confirmedBlockHeight
        }
    }
"};

const SYNC_PROPOSAL_INFOS_QUERY: &str = indoc! {"
    query SyncProposalInfos(
        $skipCount: Int!,
        $chainId: String!,
        $startBlockHeight: Long!,
        $endBlockHeight: Long!,
        $maxResultCount: Int!
    ) {
        dataList: getSyncProposalInfos(input: {
            skipCount: $skipCount,
            chainId: $chainId,
            startBlockHeight: $startBlockHeight,
            endBlockHeight: $endBlockHeight,
            maxResultCount: $maxResultCount
        }) {
            id, chainId, blockHeight,
            dAOId, proposalId, proposalTitle, proposalDescription, forumUrl, proposalType,
            activeStartTime, activeEndTime, executeStartTime, executeEndTime,
            proposalStatus, proposalStage, proposer, schemeAddress,
            transaction { toAddress, contractMethodName, params },
            voteSchemeId, vetoProposalId, deployTime, executeTime,
            governanceMechanism,
            minimalRequiredThreshold, minimalVoteThreshold, minimalApproveThreshold,
            maximalRejectionThreshold, maximalAbstentionThreshold,
            activeTimePeriod, vetoActiveTimePeriod, pendingTimePeriod, executeTimePeriod,
            vetoExecuteTimePeriod, isNetworkDAO
        }
    }
"};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub api_key: Option<SecretString>,
}

/// [Source] implementation querying the upstream indexer via GraphQL over HTTP.
#[derive(Debug, Clone)]
pub struct GraphQlSource {
    http: HttpClient,
    url: String,
    api_key: Option<SecretString>,
}

impl GraphQlSource {
    /// Create a new [GraphQlSource] with the given [Config].
    pub fn new(config: Config) -> Result<Self, GraphQlSourceError> {
        let Config {
            url,
            timeout,
            api_key,
        } = config;

        let http = HttpClient::builder()
            .user_agent("proposal-indexer/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self { http, url, api_key })
    }

    async fn query<V, T>(&self, body: QueryBody<V>) -> Result<T, GraphQlSourceError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(&self.url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .send()
            .await?
            .error_for_status()?
            .json::<Response<T>>()
            .await?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let errors = errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(GraphQlSourceError::GraphQl(errors));
        }

        response
            .data
            .ok_or(GraphQlSourceError::NoData(body.operation_name))
    }
}

impl Source for GraphQlSource {
    type Error = GraphQlSourceError;

    #[trace(properties = { "chain_id": "{chain_id}" })]
    async fn confirmed_height(&self, chain_id: &ChainId) -> Result<i64, Self::Error> {
        let body = QueryBody {
            variables: SyncStateVariables {
                chain_id: chain_id.to_string(),
                filter_type: "LOG_EVENT",
            },
            query: SYNC_STATE_QUERY,
            operation_name: "SyncState",
        };

        let data = self.query::<_, SyncStateData>(body).await?;
        Ok(data.sync_state.confirmed_block_height)
    }

    #[trace]
    async fn proposal_page(&self, range: &SyncRange) -> Result<Vec<SourceRecord>, Self::Error> {
        // The upstream range is inclusive at both ends.
        let body = QueryBody {
            variables: SyncProposalInfosVariables {
                skip_count: range.skip_count,
                chain_id: range.chain_id.to_string(),
                start_block_height: range.start_height,
                end_block_height: range.end_height - 1,
                max_result_count: range.page_size,
            },
            query: SYNC_PROPOSAL_INFOS_QUERY,
            operation_name: "SyncProposalInfos",
        };

        let data = self.query::<_, SyncProposalInfosData>(body).await?;
        let records = data
            .data_list
            .unwrap_or_default()
            .into_iter()
            .map(RawProposalRecord::decode)
            .collect::<Vec<_>>();
        debug!(
            chain_id:% = range.chain_id,
            skip_count = range.skip_count,
            records = records.len();
            "fetched proposal page"
        );

        Ok(records)
    }
}

#[derive(Debug, Error)]
pub enum GraphQlSourceError {
    #[error("cannot send GraphQL request")]
    Http(#[from] reqwest::Error),

    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    #[error("no data in response to {0}")]
    NoData(&'static str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncStateVariables {
    chain_id: String,
    filter_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncStateData {
    sync_state: SyncState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncState {
    confirmed_block_height: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncProposalInfosVariables {
    skip_count: u64,
    chain_id: String,
    start_block_height: i64,
    end_block_height: i64,
    max_result_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncProposalInfosData {
    data_list: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{MalformedRecord, RawEnum, Source, SyncKind, SyncRange},
        infra::graphql_source::{Config, GraphQlSource, GraphQlSourceError},
    };
    use assert_matches::assert_matches;
    use axum::{Json, Router, routing::post};
    use indexer_common::domain::ChainId;
    use serde_json::{Value, json};
    use std::{error::Error as StdError, time::Duration};
    use tokio::net::TcpListener;

    async fn graphql(Json(body): Json<Value>) -> Json<Value> {
        let response = match body["operationName"].as_str() {
            Some("SyncState") if body["variables"]["chainId"] == "AELF" => {
                assert_eq!(body["variables"]["filterType"], "LOG_EVENT");
                json!({ "data": { "syncState": { "confirmedBlockHeight": 1234 } } })
            }

            Some("SyncProposalInfos") => {
                let variables = &body["variables"];
                assert_eq!(variables["startBlockHeight"], 100);
                assert_eq!(variables["endBlockHeight"], 199);
                assert_eq!(variables["skipCount"], 20);
                assert_eq!(variables["maxResultCount"], 10);

                json!({
                    "data": {
                        "dataList": [
                            {
                                "chainId": "AELF",
                                "blockHeight": 101,
                                "proposalId": "p1",
                                "proposalStage": "Active"
                            },
                            {
                                "chainId": "AELF",
                                "blockHeight": 150,
                                "proposalId": "p2",
                                "proposalStage": 4
                            },
                            {
                                "chainId": "AELF",
                                "blockHeight": 160,
                                "proposalId": "p3",
                                "minimalVoteThreshold": "10"
                            }
                        ]
                    }
                })
            }

            _ => json!({ "errors": [ { "message": "unknown chain" } ] }),
        };

        Json(response)
    }

    async fn source() -> Result<GraphQlSource, Box<dyn StdError>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let app = Router::new().route("/graphql", post(graphql));
        tokio::spawn(async move { axum::serve(listener, app).await });

        let source = GraphQlSource::new(Config {
            url: format!("http://{address}/graphql"),
            timeout: Duration::from_secs(5),
            api_key: None,
        })?;

        Ok(source)
    }

    #[tokio::test]
    async fn test_confirmed_height() -> Result<(), Box<dyn StdError>> {
        let source = source().await?;

        let height = source.confirmed_height(&ChainId::try_from("AELF")?).await?;
        assert_eq!(height, 1234);

        let result = source.confirmed_height(&ChainId::try_from("tDVV")?).await;
        assert_matches!(result, Err(GraphQlSourceError::GraphQl(errors)) if errors == "unknown chain");

        Ok(())
    }

    #[tokio::test]
    async fn test_proposal_page() -> Result<(), Box<dyn StdError>> {
        let source = source().await?;

        let range = SyncRange {
            chain_id: ChainId::try_from("AELF")?,
            sync_kind: SyncKind::ProposalSync,
            start_height: 100,
            end_height: 200,
            skip_count: 20,
            page_size: 10,
        };
        let records = source.proposal_page(&range).await?;

        assert_eq!(records.len(), 3);
        assert_matches!(
            &records[0],
            Ok(record) if record.block_height == Some(101)
                && record.proposal_stage == Some(RawEnum::Name("Active".to_owned()))
        );
        assert_matches!(
            &records[1],
            Ok(record) if record.proposal_stage == Some(RawEnum::Code(4))
        );
        assert_matches!(
            &records[2],
            Err(MalformedRecord {
                block_height: Some(160),
                proposal_id: Some(proposal_id),
                ..
            }) if proposal_id == "p3"
        );

        Ok(())
    }
}
