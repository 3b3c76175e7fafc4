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

pub mod v1;

use crate::domain::{Api, QueryEngine, QueryError};
use async_graphql::Context;
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use indexer_common::{domain::ProposalIndex, error::StdErrorExt, infra::pool::Pool};
use log::{error, info, warn};
use serde::Deserialize;
use std::{io, net::IpAddr};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub address: IpAddr,
    pub port: u16,

    #[serde(with = "byte_unit_serde")]
    pub request_body_limit: u64,

    pub max_complexity: usize,
    pub max_depth: usize,
}

/// Axum based [Api] implementation serving GraphQL under `/api/v1/graphql`.
pub struct AxumApi {
    config: Config,
    pool: Option<Pool>,
}

impl AxumApi {
    pub fn new(config: Config) -> Self {
        Self { config, pool: None }
    }

    /// Make `/ready` depend on the given database being reachable.
    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pool = Some(pool);
        self
    }
}

impl Api for AxumApi {
    type Error = AxumApiError;

    async fn serve<I>(self, engine: QueryEngine<I>) -> Result<(), Self::Error>
    where
        I: ProposalIndex,
    {
        let Config {
            address,
            port,
            request_body_limit,
            max_complexity,
            max_depth,
        } = self.config;

        let app = make_app(
            engine,
            self.pool,
            max_complexity,
            max_depth,
            request_body_limit as usize,
        );

        let listener = TcpListener::bind((address, port))
            .await
            .map_err(AxumApiError::Bind)?;
        info!(address:?, port; "listening to TCP connections");

        axum::serve(listener, app)
            .await
            .map_err(AxumApiError::Serve)
    }
}

#[derive(Debug, Error)]
pub enum AxumApiError {
    #[error("cannot bind tcp listener")]
    Bind(#[source] io::Error),

    #[error("cannot serve API")]
    Serve(#[source] io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned from resolvers. Only client errors carry details.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{0}")]
    Client(String),

    #[error("Internal Server Error")]
    Server,
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        match &error {
            QueryError::InvalidChainId(_) => ApiError::Client(error.as_chain()),

            QueryError::Index(_) => {
                error!(error:% = error.as_chain(); "cannot answer query");
                ApiError::Server
            }
        }
    }
}

trait ContextExt {
    fn get_engine<I>(&self) -> &QueryEngine<I>
    where
        I: ProposalIndex;
}

impl ContextExt for Context<'_> {
    fn get_engine<I>(&self) -> &QueryEngine<I>
    where
        I: ProposalIndex,
    {
        self.data::<QueryEngine<I>>()
            .expect("QueryEngine is stored in Context")
    }
}

fn make_app<I>(
    engine: QueryEngine<I>,
    pool: Option<Pool>,
    max_complexity: usize,
    max_depth: usize,
    request_body_limit: usize,
) -> Router
where
    I: ProposalIndex,
{
    let v1_app = v1::make_app(engine, max_complexity, max_depth);

    Router::new()
        .route("/ready", get(ready))
        .nest("/api/v1", v1_app)
        .with_state(pool)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(request_body_limit))
                .layer(CorsLayer::permissive()),
        )
}

async fn ready(State(pool): State<Option<Pool>>) -> impl IntoResponse {
    if let Some(pool) = pool {
        if let Err(error) = sqlx::query("SELECT 1").execute(&*pool).await {
            warn!(error:% = error.as_chain(); "database not ready");
            return (StatusCode::SERVICE_UNAVAILABLE, "database not ready").into_response();
        }
    }

    StatusCode::OK.into_response()
}
