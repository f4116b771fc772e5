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

//! Window specifications (C1): sliding and fixed windows over one or more
//! window lengths sharing a single bucket period.

use crate::duration::parse_duration_ms;
use crate::error::{Error, Result};

/// Number of buckets the smallest window is divided into when no explicit
/// period is supplied. A configuration constant, never mutable global
/// state.
pub const DEFAULT_BUCKETS_PER_WINDOW: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Windows slide continuously; bucket boundaries are relative to the
    /// key's `base_time`.
    Sliding,
    /// Windows align to absolute epoch boundaries (multiples of the
    /// period).
    Fixed,
}

/// One or more window lengths sharing a single bucket period.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    kind: WindowKind,
    /// Window lengths in milliseconds, sorted ascending.
    windows_ms: Vec<i64>,
    /// The tokens as originally supplied (e.g. `"1h"`), same order as
    /// `windows_ms`, used verbatim in emitted feature keys.
    window_tokens: Vec<String>,
    period_ms: i64,
}

impl WindowSpec {
    /// Builds a `SlidingWindows` spec. `period` defaults to
    /// `smallest_window / bucketsPerWindow` when `None`, using the published
    /// [`DEFAULT_BUCKETS_PER_WINDOW`]. Callers with a configured
    /// `bucketsPerWindow` (§10) should use
    /// [`Self::sliding_with_buckets_per_window`] instead.
    pub fn sliding(windows: &[&str], period: Option<&str>) -> Result<Self> {
        Self::sliding_with_buckets_per_window(windows, period, DEFAULT_BUCKETS_PER_WINDOW)
    }

    /// Same as [`Self::sliding`], but with an explicit `bucketsPerWindow`
    /// rather than the published default.
    pub fn sliding_with_buckets_per_window(
        windows: &[&str],
        period: Option<&str>,
        buckets_per_window: i64,
    ) -> Result<Self> {
        Self::new(WindowKind::Sliding, windows, period, buckets_per_window)
    }

    /// Builds a `FixedWindows` spec. The period is always
    /// `smallest_window / bucketsPerWindow`; an explicit period is
    /// rejected as `WindowConfigInvalid`.
    pub fn fixed(windows: &[&str]) -> Result<Self> {
        Self::fixed_with_buckets_per_window(windows, DEFAULT_BUCKETS_PER_WINDOW)
    }

    /// Same as [`Self::fixed`], but with an explicit `bucketsPerWindow`
    /// rather than the published default.
    pub fn fixed_with_buckets_per_window(windows: &[&str], buckets_per_window: i64) -> Result<Self> {
        Self::new(WindowKind::Fixed, windows, None, buckets_per_window)
    }

    fn new(
        kind: WindowKind,
        windows: &[&str],
        period: Option<&str>,
        buckets_per_window: i64,
    ) -> Result<Self> {
        if windows.is_empty() {
            return Err(Error::WindowConfigInvalid(
                "window list must be non-empty".into(),
            ));
        }

        let mut pairs: Vec<(i64, String)> = windows
            .iter()
            .map(|tok| parse_duration_ms(tok).map(|ms| (ms, (*tok).to_string())))
            .collect::<Result<_>>()?;
        pairs.sort_by_key(|(ms, _)| *ms);
        let windows_ms: Vec<i64> = pairs.iter().map(|(ms, _)| *ms).collect();
        let window_tokens: Vec<String> = pairs.into_iter().map(|(_, tok)| tok).collect();

        let smallest = windows_ms[0];
        let period_ms = match (kind, period) {
            (WindowKind::Sliding, Some(p)) => parse_duration_ms(p)?,
            (WindowKind::Sliding, None) => smallest / buckets_per_window.max(1),
            (WindowKind::Fixed, Some(_)) => {
                return Err(Error::WindowConfigInvalid(
                    "FixedWindows does not accept an explicit period".into(),
                ))
            }
            (WindowKind::Fixed, None) => smallest / buckets_per_window.max(1),
        };

        if period_ms <= 0 {
            return Err(Error::WindowConfigInvalid(format!(
                "derived period must be positive, got {period_ms}ms"
            )));
        }

        for ms in &windows_ms {
            if ms % period_ms != 0 || ms / period_ms <= 0 {
                return Err(Error::WindowConfigInvalid(format!(
                    "window {ms}ms is not a positive integer multiple of period {period_ms}ms"
                )));
            }
        }

        Ok(Self {
            kind,
            windows_ms,
            window_tokens,
            period_ms,
        })
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn period_ms(&self) -> i64 {
        self.period_ms
    }

    /// Window lengths in milliseconds, ascending.
    pub fn windows_ms(&self) -> &[i64] {
        &self.windows_ms
    }

    /// The originally supplied tokens, same order as [`Self::windows_ms`].
    pub fn window_tokens(&self) -> &[String] {
        &self.window_tokens
    }

    pub fn largest_window_ms(&self) -> i64 {
        *self.windows_ms.last().expect("non-empty by construction")
    }

    pub fn smallest_window_ms(&self) -> i64 {
        self.windows_ms[0]
    }

    /// `total_buckets = max_window / period`: the ring depth that bounds
    /// memory for every bucket column built from this spec.
    pub fn total_buckets(&self) -> i64 {
        self.largest_window_ms() / self.period_ms
    }

    /// Computes `first_bucket_start_time` from a key's `base_time` per the
    /// spec's alignment rule: identity for sliding windows, floor-to-period
    /// for fixed windows.
    pub fn align_base_time(&self, base_time: i64) -> i64 {
        match self.kind {
            WindowKind::Sliding => base_time,
            WindowKind::Fixed => floor_to_period(base_time, self.period_ms),
        }
    }

    /// For `FixedWindows`, rounds `t` up to the exclusive end of its
    /// enclosing period bucket, i.e. the timestamp one tick into the next
    /// bucket. Feature extraction then queries `round_up_to_window(t) - 1`,
    /// which lands on the last millisecond of `t`'s own bucket so that a
    /// just-closed fixed window is reported in full.
    pub fn round_up_to_window(&self, t: i64) -> i64 {
        floor_to_period(t, self.period_ms) + self.period_ms
    }
}

fn floor_to_period(t: i64, period: i64) -> i64 {
    t.div_euclid(period) * period
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_defaults_period_from_smallest_window() {
        let spec = WindowSpec::sliding(&["1h", "2h", "24h"], None).unwrap();
        assert_eq!(spec.period_ms(), 3_600_000 / DEFAULT_BUCKETS_PER_WINDOW);
        assert_eq!(spec.total_buckets(), 24 * DEFAULT_BUCKETS_PER_WINDOW);
        assert_eq!(spec.windows_ms(), &[3_600_000, 7_200_000, 86_400_000]);
    }

    #[test]
    fn sliding_honors_a_configured_buckets_per_window() {
        let spec = WindowSpec::sliding_with_buckets_per_window(&["1h"], None, 4).unwrap();
        assert_eq!(spec.period_ms(), 3_600_000 / 4);
        assert_eq!(spec.total_buckets(), 4);
    }

    #[test]
    fn sliding_accepts_explicit_period() {
        let spec = WindowSpec::sliding(&["1h", "2h"], Some("10m")).unwrap();
        assert_eq!(spec.period_ms(), 600_000);
        assert_eq!(spec.total_buckets(), 12);
    }

    #[test]
    fn rejects_non_divisible_window() {
        let err = WindowSpec::sliding(&["1h"], Some("7m")).unwrap_err();
        assert!(matches!(err, Error::WindowConfigInvalid(_)));
    }

    #[test]
    fn fixed_rejects_explicit_period() {
        assert!(WindowSpec::fixed(&["1h"]).is_ok());
        let err = WindowSpec::new(WindowKind::Fixed, &["1h"], Some("10m"), 10).unwrap_err();
        assert!(matches!(err, Error::WindowConfigInvalid(_)));
    }

    #[test]
    fn fixed_aligns_base_time_to_period() {
        let spec = WindowSpec::fixed(&["1h"]).unwrap();
        let period = spec.period_ms();
        assert_eq!(spec.align_base_time(period + 1), period);
        assert_eq!(spec.align_base_time(period - 1), 0);
    }

    #[test]
    fn windows_are_sorted_ascending_regardless_of_input_order() {
        let spec = WindowSpec::sliding(&["24h", "1h", "2h"], Some("10m")).unwrap();
        assert_eq!(spec.windows_ms(), &[3_600_000, 7_200_000, 86_400_000]);
        assert_eq!(spec.window_tokens(), &["1h", "2h", "24h"]);
    }
}
