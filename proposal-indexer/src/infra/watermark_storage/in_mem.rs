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

use crate::domain::{WatermarkKey, WatermarkStorage};
use parking_lot::RwLock;
use std::{collections::HashMap, convert::Infallible, sync::Arc};

/// In-memory based [WatermarkStorage] implementation.
#[derive(Debug, Default, Clone)]
pub struct InMemWatermarkStorage {
    heights: Arc<RwLock<HashMap<WatermarkKey, i64>>>,
}

impl WatermarkStorage for InMemWatermarkStorage {
    type Error = Infallible;

    async fn load_height(&self, key: &WatermarkKey) -> Result<Option<i64>, Self::Error> {
        Ok(self.heights.read().get(key).copied())
    }

    async fn raise_height(&self, key: &WatermarkKey, height: i64) -> Result<(), Self::Error> {
        let mut heights = self.heights.write();
        let stored = heights.entry(key.to_owned()).or_insert(height);
        *stored = (*stored).max(height);

        Ok(())
    }
}
