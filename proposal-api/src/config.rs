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

use crate::{application, infra};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run_migrations: bool,

    #[serde(rename = "application")]
    pub application_config: application::Config,

    #[serde(rename = "infra")]
    pub infra_config: infra::Config,

    #[serde(rename = "telemetry")]
    pub telemetry_config: indexer_common::telemetry::Config,
}

#[cfg(all(test, not(feature = "cloud")))]
mod tests {
    use crate::config::Config;
    use indexer_common::config::ConfigExt;

    #[test]
    fn test_config_yaml() {
        let config = <Config as ConfigExt>::figment(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/config.yaml"
        ))
        .extract::<Config>();

        let config = config.expect("config.yaml can be loaded");
        assert_eq!(config.application_config.max_page_size, 100);
        assert_eq!(config.infra_config.api_config.port, 8088);
        assert_eq!(config.infra_config.api_config.request_body_limit, 1024 * 1024);
    }
}
