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

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("key {0:?} not found in table")]
    KeyNotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;
