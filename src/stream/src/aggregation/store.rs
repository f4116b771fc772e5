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

//! The keyed aggregation store (§4.6): one [`StoreElement`] per key, plus
//! the shared `Vec<FieldAggregator>` every element was built from.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tideflow_common::Value;

use crate::aggregation::field::FieldAggregator;
use crate::aggregation::store_element::StoreElement;

#[derive(Debug)]
pub struct AggregateStore {
    fields: Arc<Vec<FieldAggregator>>,
    elements: HashMap<String, StoreElement>,
}

impl AggregateStore {
    pub fn new(fields: Vec<FieldAggregator>) -> Self {
        Self {
            fields: Arc::new(fields),
            elements: HashMap::new(),
        }
    }

    pub fn fields(&self) -> &[FieldAggregator] {
        &self.fields
    }

    pub fn aggregate(&mut self, key: &str, body: &Value, t: i64) {
        let fields = self.fields.clone();
        let element = self
            .elements
            .entry(key.to_string())
            .or_insert_with(|| StoreElement::new(&fields, t));
        element.aggregate(&fields, body, t);
    }

    pub fn features_at(&self, key: &str, t: i64) -> Option<BTreeMap<String, Value>> {
        self.elements.get(key).map(|el| el.features_at(&self.fields, t))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.elements.keys()
    }

    pub fn kind_versions(&self, key: &str) -> HashMap<String, u64> {
        self.elements
            .get(key)
            .map(|el| el.kind_versions(&self.fields))
            .unwrap_or_default()
    }

    /// The feature keys for `key` that changed since `baseline` (§4.9,
    /// `EmissionType::Incremental`). Empty when the key is unknown or
    /// nothing changed.
    pub fn changed_feature_keys(&self, key: &str, baseline: &HashMap<String, u64>) -> Vec<String> {
        self.elements
            .get(key)
            .map(|el| el.changed_feature_keys(&self.fields, baseline))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::kind::AggKind;
    use tideflow_common::WindowSpec;

    #[test]
    fn aggregates_and_extracts_features_per_key() {
        let spec = Arc::new(WindowSpec::sliding(&["1h"], Some("10m")).unwrap());
        let fa = FieldAggregator::by_name(
            "price",
            "price",
            vec![AggKind::parse("sum").unwrap(), AggKind::parse("avg").unwrap()],
            spec,
        )
        .unwrap();
        let mut store = AggregateStore::new(vec![fa]);

        let mut body = Value::map();
        body.insert("price", Value::Int(10));
        store.aggregate("k1", &body, 0);
        store.aggregate("k1", &body, 1_000);

        let feats = store.features_at("k1", 1_000).unwrap();
        assert_eq!(feats.get("price_sum_1h"), Some(&Value::Float(20.0)));
        assert_eq!(feats.get("price_avg_1h"), Some(&Value::Float(10.0)));
        assert!(store.features_at("missing", 0).is_none());
    }
}
