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

//! Where events go once a pipeline is done transforming them.

use async_trait::async_trait;
use tideflow_stream::Event;

use crate::error::ConnectorResult;

#[async_trait]
pub trait StreamSink: Send {
    async fn write(&mut self, event: Event) -> ConnectorResult<()>;
}

/// Writes each event's body to stdout via `tracing`, one line per event.
/// The example binary's default sink.
pub struct PrintSink;

#[async_trait]
impl StreamSink for PrintSink {
    async fn write(&mut self, event: Event) -> ConnectorResult<()> {
        tracing::info!(key = event.key_or_default(), body = %event.body, "sink");
        Ok(())
    }
}
