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

use fastrace::collector::{self, ConsoleReporter};
use log::{LevelFilter, info, warn};
use logforth::append;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::{env, net::IpAddr};

const RUST_LOG: &str = "RUST_LOG";

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "tracing", default)]
    pub tracing_config: TracingConfig,

    #[serde(rename = "metrics", default)]
    pub metrics_config: MetricsConfig,
}

/// Tracing configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracingConfig {
    pub enabled: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: IpAddr,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: [0, 0, 0, 0].into(),
            port: 9000,
        }
    }
}

/// Initialize logging with the level taken from `RUST_LOG`, `info` if absent or invalid.
pub fn init_logging() {
    let level = level_filter(env::var(RUST_LOG).ok().as_deref());

    logforth::builder()
        .dispatch(|d| d.filter(level).append(append::Stdout::default()))
        .apply();
}

/// Initialize tracing: spans created via fastrace are reported to the console if enabled.
pub fn init_tracing(config: TracingConfig) {
    if config.enabled {
        fastrace::set_reporter(ConsoleReporter, collector::Config::default());
        info!("tracing enabled");
    }
}

/// Initialize metrics: a Prometheus exporter with an HTTP listener is installed if enabled.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(config: MetricsConfig) {
    let MetricsConfig {
        enabled,
        address,
        port,
    } = config;

    if enabled {
        match PrometheusBuilder::new()
            .with_http_listener((address, port))
            .install()
        {
            Ok(()) => info!(address:%, port; "metrics exporter installed"),
            Err(error) => warn!(error:%; "cannot install metrics exporter"),
        }
    }
}

fn level_filter(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info)
}
