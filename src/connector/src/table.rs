// Copyright 2024 Tideflow Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A small key/value lookup abstraction operators can join against, e.g. to
//! enrich an event with reference data before it reaches the aggregator.

use async_trait::async_trait;
use tideflow_common::Value;

use crate::error::ConnectorResult;

#[async_trait]
pub trait KvTable: Send + Sync {
    async fn get(&self, key: &str) -> ConnectorResult<Option<Value>>;
    async fn put(&self, key: &str, value: Value) -> ConnectorResult<()>;
}

/// An in-memory table, mainly useful for tests and small demos.
#[derive(Default)]
pub struct MemoryTable {
    inner: tokio::sync::RwLock<std::collections::HashMap<String, Value>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvTable for MemoryTable {
    async fn get(&self, key: &str) -> ConnectorResult<Option<Value>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> ConnectorResult<()> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let table = MemoryTable::new();
        table.put("a", Value::Int(1)).await.unwrap();
        assert_eq!(table.get("a").await.unwrap(), Some(Value::Int(1)));
        assert_eq!(table.get("missing").await.unwrap(), None);
    }
}
