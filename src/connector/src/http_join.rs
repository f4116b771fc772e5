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

//! An example stateful operator that enriches each event with the response
//! of an external HTTP call, bounded by a semaphore so a slow upstream
//! service can't let unbounded concurrent requests pile up (§5, "Shared
//! resources").

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use tideflow_common::Value;
use tideflow_stream::executor::Operator;
use tideflow_stream::{Event, StreamError};

use crate::error::ConnectorError;

/// Abstracts the transport so `HttpJoinOperator` is testable without a real
/// network call.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, ConnectorError>;
}

/// The production `HttpClient`, backed by `reqwest`.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_json(&self, url: &str) -> Result<Value, ConnectorError> {
        let body: serde_json::Value =
            self.client.get(url).send().await.map_err(|e| ConnectorError::Request {
                url: url.to_string(),
                source: e.into(),
            })?
            .json()
            .await
            .map_err(|e| ConnectorError::Request {
                url: url.to_string(),
                source: e.into(),
            })?;
        Ok(json_to_value(body))
    }
}

fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::List(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            let mut out = std::collections::BTreeMap::new();
            for (k, v) in map {
                out.insert(k, json_to_value(v));
            }
            Value::Map(out)
        }
    }
}

/// Joins every event against a URL templated from its body, merging the
/// JSON response into the event under `response_field`.
pub struct HttpJoinOperator {
    client: Arc<dyn HttpClient>,
    url_template: Arc<dyn Fn(&Value) -> String + Send + Sync>,
    response_field: String,
    inflight: Arc<Semaphore>,
}

impl HttpJoinOperator {
    pub fn new(
        client: Arc<dyn HttpClient>,
        url_template: impl Fn(&Value) -> String + Send + Sync + 'static,
        response_field: impl Into<String>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            client,
            url_template: Arc::new(url_template),
            response_field: response_field.into(),
            inflight: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }
}

#[async_trait]
impl Operator for HttpJoinOperator {
    async fn process(&mut self, mut event: Event) -> Result<Vec<Event>, StreamError> {
        let url = (self.url_template)(&event.body);
        let _permit = self
            .inflight
            .acquire()
            .await
            .expect("semaphore is never closed");
        let response = self.client.get_json(&url).await?;
        event.body.insert(self.response_field.clone(), response);
        Ok(vec![event])
    }

    fn name(&self) -> &str {
        "http_join"
    }
}

impl From<ConnectorError> for StreamError {
    fn from(e: ConnectorError) -> Self {
        StreamError::Internal(anyhow::anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient;

    #[async_trait]
    impl HttpClient for StubClient {
        async fn get_json(&self, _url: &str) -> Result<Value, ConnectorError> {
            Ok(Value::Int(42))
        }
    }

    #[tokio::test]
    async fn merges_response_into_event_body() {
        let mut op = HttpJoinOperator::new(Arc::new(StubClient), |_| "http://example".to_string(), "resp", 2);
        let event = Event::new(Value::map(), 0);
        let out = op.process(event).await.unwrap();
        assert_eq!(out[0].body.get("resp"), Some(&Value::Int(42)));
    }
}
