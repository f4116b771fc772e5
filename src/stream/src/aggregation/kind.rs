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

//! The aggregate kinds a [`crate::aggregation::field::FieldAggregator`] can
//! request: raw kinds that aggregate a sample directly into a bucket, and
//! virtual kinds that are derived from one or more raw columns at query
//! time (§4.4).

use tideflow_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum RawKind {
    Sum,
    Count,
    Min,
    Max,
    First,
    Last,
}

impl RawKind {
    pub fn name(self) -> &'static str {
        match self {
            RawKind::Sum => "sum",
            RawKind::Count => "count",
            RawKind::Min => "min",
            RawKind::Max => "max",
            RawKind::First => "first",
            RawKind::Last => "last",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKind {
    Avg,
}

impl VirtualKind {
    pub fn name(self) -> &'static str {
        match self {
            VirtualKind::Avg => "avg",
        }
    }

    /// The raw kinds this virtual kind is derived from, in the order
    /// [`Self::derive`] expects its arguments.
    pub fn dependencies(self) -> &'static [RawKind] {
        match self {
            VirtualKind::Avg => &[RawKind::Sum, RawKind::Count],
        }
    }

    /// Combines the per-window values of this kind's dependencies (in
    /// [`Self::dependencies`] order) into the derived value. `None` for a
    /// missing dependency value propagates to `None` (no window value yet).
    pub fn derive(self, args: &[Option<f64>]) -> Option<f64> {
        match self {
            VirtualKind::Avg => {
                let sum = args[0]?;
                let count = args[1]?;
                if count > 0.0 {
                    Some(sum / count)
                } else {
                    Some(0.0)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggKind {
    Raw(RawKind),
    Virtual(VirtualKind),
}

impl AggKind {
    pub fn parse(token: &str) -> Result<Self, Error> {
        Ok(match token.to_ascii_lowercase().as_str() {
            "sum" => AggKind::Raw(RawKind::Sum),
            "count" => AggKind::Raw(RawKind::Count),
            "min" => AggKind::Raw(RawKind::Min),
            "max" => AggKind::Raw(RawKind::Max),
            "first" => AggKind::Raw(RawKind::First),
            "last" => AggKind::Raw(RawKind::Last),
            "avg" => AggKind::Virtual(VirtualKind::Avg),
            other => return Err(Error::UnknownAggregate(other.to_string())),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            AggKind::Raw(r) => r.name(),
            AggKind::Virtual(v) => v.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tokens_case_insensitively() {
        assert_eq!(AggKind::parse("SUM").unwrap(), AggKind::Raw(RawKind::Sum));
        assert_eq!(AggKind::parse("avg").unwrap(), AggKind::Virtual(VirtualKind::Avg));
    }

    #[test]
    fn rejects_unknown_token() {
        assert!(matches!(
            AggKind::parse("median"),
            Err(Error::UnknownAggregate(_))
        ));
    }

    #[test]
    fn avg_depends_on_sum_and_count() {
        assert_eq!(VirtualKind::Avg.dependencies(), &[RawKind::Sum, RawKind::Count]);
        assert_eq!(VirtualKind::Avg.derive(&[Some(10.0), Some(4.0)]), Some(2.5));
        assert_eq!(VirtualKind::Avg.derive(&[Some(0.0), Some(0.0)]), Some(0.0));
        assert_eq!(VirtualKind::Avg.derive(&[None, Some(4.0)]), None);
    }
}
