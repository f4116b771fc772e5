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

/// A specialized `Result` for construction-time and data-model errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Construction-time errors: raised synchronously while building window
/// specs, field aggregators, or graphs, never while a pipeline is running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed duration {0:?}: expected '<int><unit>' with unit in s/m/h/d")]
    MalformedDuration(String),

    #[error("invalid window configuration: {0}")]
    WindowConfigInvalid(String),

    #[error("invalid key spec: {0}")]
    InvalidKeySpec(String),

    #[error("invalid field spec: {0}")]
    InvalidFieldSpec(String),

    #[error("unknown aggregate kind {0:?}")]
    UnknownAggregate(String),
}
