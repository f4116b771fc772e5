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

//! Connectors for the Tideflow engine: sinks events flow out to, key/value
//! tables an operator can look up against, and an example external-call
//! operator built on both.

pub mod error;
pub mod http_join;
pub mod sink;
pub mod table;

pub use error::{ConnectorError, ConnectorResult};
pub use http_join::{HttpClient, HttpJoinOperator, ReqwestHttpClient};
pub use sink::{PrintSink, StreamSink};
pub use table::KvTable;
