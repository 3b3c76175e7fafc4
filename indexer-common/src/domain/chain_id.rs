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

use derive_more::{AsRef, Deref, Display, Into};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::LazyLock};
use thiserror::Error;

/// Four base58 characters, e.g. "AELF" or "tDVV".
static CHAIN_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[1-9A-HJ-NP-Za-km-z]{4}$").expect("chain ID regex is valid")
});

/// Chain identifier.
#[derive(
    Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, AsRef, Deref, Into, Serialize,
    Deserialize,
)]
#[as_ref(str)]
#[deref(forward)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(String);

impl TryFrom<String> for ChainId {
    type Error = InvalidChainIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            Err(InvalidChainIdError::Empty)
        } else if !CHAIN_ID_REGEX.is_match(&s) {
            Err(InvalidChainIdError::Malformed(s))
        } else {
            Ok(Self(s))
        }
    }
}

impl TryFrom<&str> for ChainId {
    type Error = InvalidChainIdError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.to_owned().try_into()
    }
}

impl FromStr for ChainId {
    type Err = InvalidChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidChainIdError {
    #[error("chain ID must not be empty")]
    Empty,

    #[error("malformed chain ID {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use crate::domain::{ChainId, InvalidChainIdError};
    use assert_matches::assert_matches;

    #[test]
    fn test_chain_id() {
        assert_matches!(ChainId::try_from("AELF"), Ok(chain_id) if chain_id.as_ref() == "AELF");
        assert!(ChainId::try_from("tDVV").is_ok());
        assert!(ChainId::try_from("tDVW").is_ok());

        assert_matches!(ChainId::try_from(""), Err(InvalidChainIdError::Empty));
        assert_matches!(ChainId::try_from("AEL"), Err(InvalidChainIdError::Malformed(_)));
        assert_matches!(ChainId::try_from("AELFX"), Err(InvalidChainIdError::Malformed(_)));
        assert_matches!(ChainId::try_from("AE0F"), Err(InvalidChainIdError::Malformed(_)));
        assert_matches!(ChainId::try_from("AE-F"), Err(InvalidChainIdError::Malformed(_)));
    }

    #[test]
    fn test_deserialize_validates() {
        let chain_id = serde_json::from_str::<ChainId>(r#""tDVW""#);
        assert!(chain_id.is_ok());

        let chain_id = serde_json::from_str::<ChainId>(r#""not a chain""#);
        assert!(chain_id.is_err());
    }
}
