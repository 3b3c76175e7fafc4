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

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::env;

const CONFIG_FILE: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const ENV_PREFIX: &str = "APP__";

/// Extension methods for configuration structs.
pub trait ConfigExt
where
    Self: for<'de> Deserialize<'de>,
{
    /// Load the configuration from the YAML file given by the `CONFIG_FILE` environment variable
    /// (defaults to `config.yaml`), overridden by environment variables prefixed with `APP__` and
    /// with `__` as separator for nested keys, e.g. `APP__INFRA__STORAGE__PASSWORD`.
    fn load() -> Result<Self, Box<figment::Error>> {
        let config_file =
            env::var(CONFIG_FILE).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Self::figment(&config_file).extract().map_err(Box::new)
    }

    /// The [Figment] used by [ConfigExt::load], exposed for layering in tests.
    fn figment(config_file: &str) -> Figment {
        Figment::new()
            .merge(Yaml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

impl<T> ConfigExt for T where T: for<'de> Deserialize<'de> {}

#[cfg(test)]
mod tests {
    use crate::config::ConfigExt;
    use figment::{Jail, providers::Serialized};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Config {
        interval: u32,
        nested: Nested,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Nested {
        name: String,
    }

    #[test]
    fn test_load() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                "interval: 5\nnested:\n  name: from-file\n",
            )?;
            jail.set_env("APP__NESTED__NAME", "from-env");

            let config = <Config as ConfigExt>::figment("config.yaml").extract::<Config>()?;
            assert_eq!(
                config,
                Config {
                    interval: 5,
                    nested: Nested {
                        name: "from-env".to_string()
                    }
                }
            );

            Ok(())
        });
    }

    #[test]
    fn test_defaults_can_be_layered() {
        let config = <Config as ConfigExt>::figment("does-not-exist.yaml")
            .join(Serialized::defaults(Config {
                interval: 1,
                nested: Nested {
                    name: "default".to_string(),
                },
            }))
            .extract::<Config>();
        assert!(config.is_ok());
    }
}
