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

use thiserror::Error;

/// Errors raised while building or running a dataflow graph.
///
/// Mirrors the shape of [`tideflow_common::Error`]: a handful of named,
/// matchable variants for conditions callers are expected to branch on, plus
/// an `Internal` catch-all for operator-callback failures that have no
/// further structure worth naming.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("emission policy {0} requires a single window spec shared by every field aggregator")]
    UnsupportedEmissionPolicy(String),

    #[error("operator channel closed, the graph has already terminated")]
    Closed,

    #[error(transparent)]
    Config(#[from] tideflow_common::Error),

    #[error("operator {operator} failed: {source}")]
    OperatorFailure {
        operator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// The error surfaced by [`crate::graph::Controller::await_termination`]: the
/// first operator failure observed anywhere in the graph, after every task
/// has wound down.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct FlowError(#[from] pub StreamError);
