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

use tideflow_common::Value;

/// The unit of data flowing through a graph: an opaque body plus the
/// metadata operators key and order by.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub body: Value,
    pub key: Option<String>,
    pub time_ms: i64,
    pub id: Option<String>,
}

impl Event {
    pub fn new(body: impl Into<Value>, time_ms: i64) -> Self {
        Self {
            body: body.into(),
            key: None,
            time_ms,
            id: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The key used to partition stateful operators, defaulting to the
    /// empty string when the event carries none.
    pub fn key_or_default(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}
