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

//! A single raw aggregate slot (§4.2): one bucket's worth of `sum`/`count`/
//! `min`/`max`/`first`/`last` state.

use crate::aggregation::kind::RawKind;

/// One bucket's running value for a single raw kind.
///
/// `first_time`/`last_time` start at the `+∞`/`-∞` sentinels respectively so
/// that the very first sample always satisfies the `first`/`last` gating
/// condition, regardless of its timestamp's sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationValue {
    kind: RawKind,
    value: f64,
    first_time: i64,
    last_time: i64,
    max_value: Option<f64>,
    apply_cap_to_count: bool,
}

impl AggregationValue {
    pub fn default_for(kind: RawKind, max_value: Option<f64>, apply_cap_to_count: bool) -> Self {
        let value = match kind {
            RawKind::Min => f64::INFINITY,
            RawKind::Max => f64::NEG_INFINITY,
            _ => 0.0,
        };
        Self {
            kind,
            value,
            first_time: i64::MAX,
            last_time: i64::MIN,
            max_value,
            apply_cap_to_count,
        }
    }

    pub fn kind(&self) -> RawKind {
        self.kind
    }

    /// Folds one sample into this slot.
    pub fn aggregate(&mut self, time: i64, input: f64) {
        match self.kind {
            RawKind::Min => {
                if input < self.value {
                    self.value = input;
                }
            }
            RawKind::Max => {
                if input > self.value {
                    self.value = input;
                }
            }
            RawKind::Sum | RawKind::Count => {
                self.value += if self.kind == RawKind::Count { 1.0 } else { input };
            }
            RawKind::First => {
                if time < self.first_time {
                    self.value = input;
                }
            }
            RawKind::Last => {
                if time > self.last_time {
                    self.value = input;
                }
            }
        }
        if time < self.first_time {
            self.first_time = time;
        }
        if time > self.last_time {
            self.last_time = time;
        }
        if let Some(cap) = self.max_value {
            if self.kind != RawKind::Count || self.apply_cap_to_count {
                self.value = self.value.min(cap);
            }
        }
    }

    /// Folds `self` (a single bucket's slot) into `acc` (a running
    /// accumulator of the same kind spanning a wider window).
    pub fn merge_into(&self, acc: &mut AggregationValue) {
        debug_assert_eq!(self.kind, acc.kind);
        match acc.kind {
            RawKind::Sum | RawKind::Count => acc.value += self.value,
            RawKind::Min => {
                if self.value < acc.value {
                    acc.value = self.value;
                }
            }
            RawKind::Max => {
                if self.value > acc.value {
                    acc.value = self.value;
                }
            }
            RawKind::First => {
                if self.first_time < acc.first_time {
                    acc.value = self.value;
                    acc.first_time = self.first_time;
                }
            }
            RawKind::Last => {
                if self.last_time > acc.last_time {
                    acc.value = self.value;
                    acc.last_time = self.last_time;
                }
            }
        }
    }

    /// The scalar to emit for this slot, or `None` for a `first`/`last` slot
    /// that has never been assigned.
    pub fn scalar(&self) -> Option<f64> {
        match self.kind {
            RawKind::First if self.first_time == i64::MAX => None,
            RawKind::Last if self.last_time == i64::MIN => None,
            _ => Some(self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_accumulates() {
        let mut v = AggregationValue::default_for(RawKind::Sum, None, false);
        v.aggregate(0, 3.0);
        v.aggregate(1, 4.0);
        assert_eq!(v.scalar(), Some(7.0));
    }

    #[test]
    fn first_and_last_track_extremes_regardless_of_arrival_order() {
        let mut first = AggregationValue::default_for(RawKind::First, None, false);
        first.aggregate(10, 1.0);
        first.aggregate(5, 2.0);
        first.aggregate(20, 3.0);
        assert_eq!(first.scalar(), Some(2.0));

        let mut last = AggregationValue::default_for(RawKind::Last, None, false);
        last.aggregate(10, 1.0);
        last.aggregate(5, 2.0);
        last.aggregate(20, 3.0);
        assert_eq!(last.scalar(), Some(3.0));
    }

    #[test]
    fn first_and_last_are_null_before_any_sample() {
        assert_eq!(
            AggregationValue::default_for(RawKind::First, None, false).scalar(),
            None
        );
        assert_eq!(
            AggregationValue::default_for(RawKind::Last, None, false).scalar(),
            None
        );
    }

    #[test]
    fn cap_applies_to_sum_but_not_count_unless_opted_in() {
        let mut sum = AggregationValue::default_for(RawKind::Sum, Some(5.0), false);
        sum.aggregate(0, 9.0);
        assert_eq!(sum.scalar(), Some(5.0));

        let mut count = AggregationValue::default_for(RawKind::Count, Some(1.0), false);
        count.aggregate(0, 1.0);
        count.aggregate(1, 1.0);
        assert_eq!(count.scalar(), Some(2.0));

        let mut capped_count = AggregationValue::default_for(RawKind::Count, Some(1.0), true);
        capped_count.aggregate(0, 1.0);
        capped_count.aggregate(1, 1.0);
        assert_eq!(capped_count.scalar(), Some(1.0));
    }

    #[test]
    fn min_max_merge_across_buckets() {
        let mut b1 = AggregationValue::default_for(RawKind::Min, None, false);
        b1.aggregate(0, 5.0);
        let mut b2 = AggregationValue::default_for(RawKind::Min, None, false);
        b2.aggregate(1, 2.0);
        let mut acc = AggregationValue::default_for(RawKind::Min, None, false);
        b1.merge_into(&mut acc);
        b2.merge_into(&mut acc);
        assert_eq!(acc.scalar(), Some(2.0));
    }
}
