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

use std::error::Error as StdError;

/// Type alias for a boxed standard error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Extension methods for standard errors.
pub trait StdErrorExt
where
    Self: StdError,
{
    /// Format this error and its chain of sources, separated by ": ".
    fn as_chain(&self) -> String {
        let mut chain = self.to_string();

        let mut source = self.source();
        while let Some(error) = source {
            chain.push_str(": ");
            chain.push_str(&error.to_string());
            source = error.source();
        }

        chain
    }
}

impl<T> StdErrorExt for T where T: StdError + ?Sized {}

#[cfg(test)]
mod tests {
    use crate::error::{BoxError, StdErrorExt};
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn test_as_chain() {
        assert_eq!(Outer(Inner).as_chain(), "outer: inner");
        assert_eq!(Inner.as_chain(), "inner");

        let boxed = BoxError::from(Outer(Inner));
        assert_eq!(boxed.as_chain(), "outer: inner");
    }
}
