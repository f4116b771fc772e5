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

//! A derived column (§4.4) computed from one or more sibling
//! [`BucketColumn`]s at query time. Holds indices into the owning store
//! element's raw column vector rather than references, so the object graph
//! stays acyclic and the element remains `Clone`-free to move across tasks.

use crate::aggregation::bucket::BucketColumn;
use crate::aggregation::kind::VirtualKind;

#[derive(Debug, Clone)]
pub struct VirtualBucketColumn {
    kind: VirtualKind,
    /// Indices into the store element's `raw_columns`, in
    /// `VirtualKind::dependencies()` order.
    dep_indices: Vec<usize>,
}

impl VirtualBucketColumn {
    pub fn new(kind: VirtualKind, dep_indices: Vec<usize>) -> Self {
        debug_assert_eq!(dep_indices.len(), kind.dependencies().len());
        Self { kind, dep_indices }
    }

    pub fn kind(&self) -> VirtualKind {
        self.kind
    }

    pub fn features_at(&self, raw_columns: &[BucketColumn], t: i64) -> Vec<(String, Option<f64>)> {
        let dep_features: Vec<Vec<(String, Option<f64>)>> = self
            .dep_indices
            .iter()
            .map(|&i| raw_columns[i].features_at(t))
            .collect();
        let num_windows = dep_features.first().map_or(0, |d| d.len());
        (0..num_windows)
            .map(|w| {
                let token = dep_features[0][w].0.clone();
                let args: Vec<Option<f64>> = dep_features.iter().map(|d| d[w].1).collect();
                (token, self.kind.derive(&args))
            })
            .collect()
    }
}
