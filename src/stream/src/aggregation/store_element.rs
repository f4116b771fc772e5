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

//! The per-key aggregation state (§4.5): every raw and virtual column this
//! key's field aggregators require, plus the bookkeeping to route a sample
//! or a feature query to them.

use std::collections::{BTreeMap, HashMap};

use tideflow_common::Value;

use crate::aggregation::bucket::BucketColumn;
use crate::aggregation::field::FieldAggregator;
use crate::aggregation::kind::AggKind;
use crate::aggregation::virtual_bucket::VirtualBucketColumn;

#[derive(Debug)]
pub struct StoreElement {
    raw_columns: Vec<BucketColumn>,
    raw_index: HashMap<(usize, crate::aggregation::kind::RawKind), usize>,
    virtual_columns: Vec<(usize, VirtualBucketColumn)>,
}

impl StoreElement {
    pub fn new(fields: &[FieldAggregator], base_time: i64) -> Self {
        let mut raw_columns = Vec::new();
        let mut raw_index = HashMap::new();
        for (fa_idx, fa) in fields.iter().enumerate() {
            for raw_kind in fa.required_raw_kinds() {
                let col = BucketColumn::new(
                    raw_kind,
                    fa.window_spec.clone(),
                    base_time,
                    fa.max_value,
                    fa.saturate_count,
                    fa.late_policy,
                );
                raw_index.insert((fa_idx, raw_kind), raw_columns.len());
                raw_columns.push(col);
            }
        }

        let mut virtual_columns = Vec::new();
        for (fa_idx, fa) in fields.iter().enumerate() {
            for kind in &fa.kinds {
                if let AggKind::Virtual(vk) = kind {
                    let dep_indices = vk
                        .dependencies()
                        .iter()
                        .map(|d| raw_index[&(fa_idx, *d)])
                        .collect();
                    virtual_columns.push((fa_idx, VirtualBucketColumn::new(*vk, dep_indices)));
                }
            }
        }

        Self {
            raw_columns,
            raw_index,
            virtual_columns,
        }
    }

    pub fn aggregate(&mut self, fields: &[FieldAggregator], body: &Value, t: i64) {
        for (fa_idx, fa) in fields.iter().enumerate() {
            if let Some(filter) = &fa.filter {
                if !filter(body) {
                    continue;
                }
            }
            let extracted = fa.field.extract(body);
            let Some(v) = extracted.as_f64() else {
                tracing::trace!(field = %fa.name, "skipping non-numeric extraction");
                continue;
            };
            for raw_kind in fa.required_raw_kinds() {
                let idx = self.raw_index[&(fa_idx, raw_kind)];
                self.raw_columns[idx].aggregate(t, v);
            }
        }
    }

    pub fn features_at(&self, fields: &[FieldAggregator], t: i64) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (fa_idx, fa) in fields.iter().enumerate() {
            for kind in &fa.kinds {
                match kind {
                    AggKind::Raw(rk) => {
                        let idx = self.raw_index[&(fa_idx, *rk)];
                        for (token, val) in self.raw_columns[idx].features_at(t) {
                            let key = format!("{}_{}_{}", fa.name, rk.name(), token);
                            out.insert(key, val.map(Value::Float).unwrap_or(Value::Null));
                        }
                    }
                    AggKind::Virtual(vk) => {
                        let vcol = self
                            .virtual_columns
                            .iter()
                            .find(|(idx, col)| *idx == fa_idx && col.kind() == *vk)
                            .map(|(_, col)| col)
                            .expect("virtual column registered in StoreElement::new");
                        for (token, val) in vcol.features_at(&self.raw_columns, t) {
                            let key = format!("{}_{}_{}", fa.name, vk.name(), token);
                            out.insert(key, val.map(Value::Float).unwrap_or(Value::Null));
                        }
                    }
                }
            }
        }
        out
    }

    /// The version of each requested kind (raw or virtual), keyed by
    /// `"{field}_{kind}"`. A virtual kind's version is the max of its
    /// dependencies' raw versions, so it changes whenever any dependency
    /// does. Used to diff against a baseline for incremental emission.
    pub fn kind_versions(&self, fields: &[FieldAggregator]) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        for (fa_idx, fa) in fields.iter().enumerate() {
            for kind in &fa.kinds {
                let version = match kind {
                    AggKind::Raw(rk) => self.raw_columns[self.raw_index[&(fa_idx, *rk)]].version(),
                    AggKind::Virtual(vk) => vk
                        .dependencies()
                        .iter()
                        .map(|d| self.raw_columns[self.raw_index[&(fa_idx, *d)]].version())
                        .max()
                        .unwrap_or(0),
                };
                out.insert(format!("{}_{}", fa.name, kind.name()), version);
            }
        }
        out
    }

    /// The feature keys whose backing kind's version differs from
    /// `baseline`, expanded across every window length that kind reports.
    /// Used by `EmissionType::Incremental` to filter a feature snapshot
    /// down to only what changed since the last emission for this key.
    pub fn changed_feature_keys(&self, fields: &[FieldAggregator], baseline: &HashMap<String, u64>) -> Vec<String> {
        let mut out = Vec::new();
        for (fa_idx, fa) in fields.iter().enumerate() {
            for kind in &fa.kinds {
                let version = match kind {
                    AggKind::Raw(rk) => self.raw_columns[self.raw_index[&(fa_idx, *rk)]].version(),
                    AggKind::Virtual(vk) => vk
                        .dependencies()
                        .iter()
                        .map(|d| self.raw_columns[self.raw_index[&(fa_idx, *d)]].version())
                        .max()
                        .unwrap_or(0),
                };
                let version_key = format!("{}_{}", fa.name, kind.name());
                if baseline.get(&version_key).copied().unwrap_or(0) != version {
                    for token in fa.window_spec.window_tokens() {
                        out.push(format!("{}_{}_{}", fa.name, kind.name(), token));
                    }
                }
            }
        }
        out
    }
}
