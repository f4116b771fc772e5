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

//! A ring of [`AggregationValue`] slots spanning a window's full depth
//! (§4.3): the raw per-kind, per-field timeline that window features are
//! computed from.

use std::collections::VecDeque;
use std::sync::Arc;

use tideflow_common::WindowSpec;

use crate::aggregation::kind::RawKind;
use crate::aggregation::value::AggregationValue;

/// How a sample older than the ring's oldest live bucket is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateEventPolicy {
    /// Silently discarded (the default).
    Drop,
    /// Discarded, but counted so callers can observe how often it happens.
    CountAsLate,
    /// The ring is reinitialized around the late event's own time, as if it
    /// were a fresh key.
    ReopenRing,
}

#[derive(Debug, Clone)]
pub struct BucketColumn {
    kind: RawKind,
    window_spec: Arc<WindowSpec>,
    slots: VecDeque<AggregationValue>,
    first_bucket_start_time: i64,
    last_bucket_start_time: i64,
    max_value: Option<f64>,
    apply_cap_to_count: bool,
    late_policy: LateEventPolicy,
    version: u64,
    late_count: u64,
}

impl BucketColumn {
    pub fn new(
        kind: RawKind,
        window_spec: Arc<WindowSpec>,
        base_time: i64,
        max_value: Option<f64>,
        apply_cap_to_count: bool,
        late_policy: LateEventPolicy,
    ) -> Self {
        let total_buckets = window_spec.total_buckets();
        let period = window_spec.period_ms();
        let first_bucket_start_time = window_spec.align_base_time(base_time);
        let last_bucket_start_time = first_bucket_start_time + (total_buckets - 1) * period;
        let slots = (0..total_buckets)
            .map(|_| AggregationValue::default_for(kind, max_value, apply_cap_to_count))
            .collect();
        Self {
            kind,
            window_spec,
            slots,
            first_bucket_start_time,
            last_bucket_start_time,
            max_value,
            apply_cap_to_count,
            late_policy,
            version: 0,
            late_count: 0,
        }
    }

    pub fn kind(&self) -> RawKind {
        self.kind
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn late_count(&self) -> u64 {
        self.late_count
    }

    fn period(&self) -> i64 {
        self.window_spec.period_ms()
    }

    fn total_buckets(&self) -> i64 {
        self.window_spec.total_buckets()
    }

    fn index(&self, t: i64) -> i64 {
        (t - self.first_bucket_start_time).div_euclid(self.period())
    }

    fn fresh_slot(&self) -> AggregationValue {
        AggregationValue::default_for(self.kind, self.max_value, self.apply_cap_to_count)
    }

    /// Folds one sample into the ring, advancing it first if `t` is newer
    /// than the ring's current span.
    pub fn aggregate(&mut self, t: i64, input: f64) {
        let period = self.period();
        if t < self.last_bucket_start_time + period {
            let idx = self.index(t);
            if idx < 0 {
                self.handle_late(t, input);
                return;
            }
            self.slots[idx as usize].aggregate(t, input);
        } else {
            let total_buckets = self.total_buckets();
            let desired = self.index(t);
            let shift = desired - (total_buckets - 1);
            if shift >= total_buckets {
                for slot in self.slots.iter_mut() {
                    *slot = self.fresh_slot_for(slot.kind());
                }
            } else {
                for _ in 0..shift {
                    self.slots.pop_front();
                    self.slots.push_back(self.fresh_slot());
                }
            }
            self.first_bucket_start_time += shift * period;
            self.last_bucket_start_time += shift * period;
            let new_idx = (total_buckets - 1) as usize;
            self.slots[new_idx].aggregate(t, input);
        }
        self.version += 1;
    }

    fn fresh_slot_for(&self, kind: RawKind) -> AggregationValue {
        AggregationValue::default_for(kind, self.max_value, self.apply_cap_to_count)
    }

    fn handle_late(&mut self, t: i64, input: f64) {
        match self.late_policy {
            LateEventPolicy::Drop => {
                tracing::trace!(time = t, "dropping late event");
            }
            LateEventPolicy::CountAsLate => {
                self.late_count += 1;
                tracing::trace!(time = t, late_count = self.late_count, "counting late event");
            }
            LateEventPolicy::ReopenRing => {
                tracing::debug!(time = t, "reopening ring for late event");
                self.first_bucket_start_time = self.window_spec.align_base_time(t);
                self.last_bucket_start_time =
                    self.first_bucket_start_time + (self.total_buckets() - 1) * self.period();
                for slot in self.slots.iter_mut() {
                    *slot = self.fresh_slot();
                }
                let idx = self.index(t).max(0) as usize;
                self.slots[idx.min(self.slots.len() - 1)].aggregate(t, input);
                self.version += 1;
            }
        }
    }

    /// Returns, for every configured window length (ascending), the scalar
    /// value of this column as of `t`. `None` marks a `first`/`last` window
    /// with no contribution yet.
    pub fn features_at(&self, t: i64) -> Vec<(String, Option<f64>)> {
        let query_index = match self.window_spec.kind() {
            tideflow_common::WindowKind::Sliding => self.index(t),
            tideflow_common::WindowKind::Fixed => {
                self.index(self.window_spec.round_up_to_window(t) - 1)
            }
        };

        let windows_ms = self.window_spec.windows_ms();
        let tokens = self.window_spec.window_tokens();
        let mut out = Vec::with_capacity(windows_ms.len());
        let mut running = self.fresh_slot();

        if query_index < 0 {
            for token in tokens {
                out.push((token.clone(), running.scalar()));
            }
            return out;
        }

        let period = self.period();
        let mut current_index = query_index;
        let mut prev_window = 0i64;
        for (w_ms, token) in windows_ms.iter().zip(tokens.iter()) {
            let delta = (w_ms - prev_window) / period;
            let lo = current_index - delta + 1;
            let hi = current_index;
            for i in lo.max(0)..=hi {
                if i >= 0 && (i as usize) < self.slots.len() {
                    self.slots[i as usize].merge_into(&mut running);
                }
            }
            out.push((token.clone(), running.scalar()));
            current_index -= delta;
            prev_window = *w_ms;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> Arc<WindowSpec> {
        Arc::new(WindowSpec::sliding(&["1h", "2h"], Some("10m")).unwrap())
    }

    #[test]
    fn single_bucket_sum_appears_in_every_enclosing_window() {
        let mut col = BucketColumn::new(RawKind::Sum, spec(), 0, None, false, LateEventPolicy::Drop);
        col.aggregate(0, 5.0);
        let feats = col.features_at(0);
        assert_eq!(feats[0].1, Some(5.0));
        assert_eq!(feats[1].1, Some(5.0));
    }

    #[test]
    fn advancing_past_ring_drops_oldest_buckets() {
        let mut col = BucketColumn::new(RawKind::Sum, spec(), 0, None, false, LateEventPolicy::Drop);
        col.aggregate(0, 100.0);
        // jump forward by the full 2h window: the old sample should fall out.
        col.aggregate(2 * 3_600_000, 1.0);
        let feats = col.features_at(2 * 3_600_000);
        assert_eq!(feats[1].1, Some(1.0));
    }

    #[test]
    fn late_event_beyond_ring_is_dropped() {
        let mut col = BucketColumn::new(RawKind::Sum, spec(), 10_000_000, None, false, LateEventPolicy::Drop);
        col.aggregate(0, 1.0);
        assert_eq!(col.version(), 0);
    }
}
