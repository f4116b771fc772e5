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

//! Typed, `serde`-derived engine configuration. This intentionally does not
//! reproduce a remote-config-service or CLI argument parser: those belong to
//! the out-of-scope outer surfaces (§1). Only the knobs the core dataflow
//! runtime itself reads live here.

use serde::{Deserialize, Serialize};

use crate::window::DEFAULT_BUCKETS_PER_WINDOW;

fn default_buckets_per_window() -> i64 {
    DEFAULT_BUCKETS_PER_WINDOW
}

fn default_queue_depth() -> usize {
    8
}

fn default_io_concurrency() -> usize {
    8
}

/// Engine-wide configuration, loadable from a TOML file via
/// [`TideflowConfig::from_toml_str`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TideflowConfig {
    /// Number of buckets each window is divided into when a window spec
    /// does not supply an explicit period.
    #[serde(default = "default_buckets_per_window")]
    pub buckets_per_window: i64,

    /// Bound on each operator's inbound queue (§4.7).
    #[serde(default = "default_queue_depth")]
    pub operator_queue_depth: usize,

    /// Cap on concurrent in-flight requests for external I/O operators
    /// (§5, "Shared resources").
    #[serde(default = "default_io_concurrency")]
    pub io_concurrency_limit: usize,
}

impl Default for TideflowConfig {
    fn default() -> Self {
        Self {
            buckets_per_window: default_buckets_per_window(),
            operator_queue_depth: default_queue_depth(),
            io_concurrency_limit: default_io_concurrency(),
        }
    }
}

impl TideflowConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let cfg = TideflowConfig::default();
        assert_eq!(cfg.buckets_per_window, DEFAULT_BUCKETS_PER_WINDOW);
        assert_eq!(cfg.operator_queue_depth, 8);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = TideflowConfig::from_toml_str("operator_queue_depth = 16").unwrap();
        assert_eq!(cfg.operator_queue_depth, 16);
        assert_eq!(cfg.buckets_per_window, DEFAULT_BUCKETS_PER_WINDOW);
    }
}
