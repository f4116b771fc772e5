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

//! When the aggregator emits a feature snapshot for a key (§4.9).

/// Controls how often the aggregator emits a feature snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmissionPolicy {
    /// Emit once per incoming event, right after aggregating it.
    EveryEvent,
    /// Emit once every `n` events per key.
    AfterMaxEvent(u64),
    /// A background ticker emits for every key once per `period_ms`
    /// (requires every field aggregator to share one window spec's period).
    /// Each tick is pushed back by `delay_ms` of wall-clock time, so a key
    /// that just missed a boundary still gets folded into it.
    AfterPeriod { delay_ms: i64 },
    /// A background ticker emits for every key once per the shared window
    /// spec's smallest window length, delayed the same way as
    /// [`Self::AfterPeriod`].
    AfterWindow { delay_ms: i64 },
    /// Same cadence as `EveryEvent`, but the emission for a given trigger is
    /// delayed by `delay_ms` of wall-clock time before being sent downstream.
    AfterDelay { delay_ms: i64 },
}

impl EmissionPolicy {
    /// `true` if this policy drives a background ticker rather than firing
    /// directly from the per-event processing path.
    pub fn needs_ticker(self) -> bool {
        matches!(
            self,
            EmissionPolicy::AfterPeriod { .. } | EmissionPolicy::AfterWindow { .. }
        )
    }
}

/// What an emission contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionType {
    /// Every configured feature key, every time.
    All,
    /// Only the feature keys whose underlying raw column changed since the
    /// last emission for that key.
    Incremental,
}
