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

//! The Tideflow dataflow runtime: composable stateful operators linked by
//! bounded async channels (§4.7), the windowed aggregator built on top of
//! them (§4.2–§4.9), and the graph builder that assembles both into a
//! runnable pipeline (§4.10).

pub mod aggregation;
pub mod emission;
pub mod error;
pub mod event;
pub mod executor;
pub mod graph;
pub mod util;

pub use error::{FlowError, StreamError, StreamResult};
pub use event::Event;
pub use graph::{Controller, GraphBuilder};
