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

//! The per-field aggregation request: which field to read, which kinds to
//! track, over which window spec, subject to an optional filter.

use std::sync::Arc;

use tideflow_common::{Error, Value, WindowSpec};

use crate::aggregation::bucket::LateEventPolicy;
use crate::aggregation::kind::{AggKind, RawKind};

/// How a `FieldAggregator` pulls its numeric input out of an event body.
#[derive(Clone)]
pub enum FieldExtractor {
    ByName(String),
    ByFn(Arc<dyn Fn(&Value) -> Value + Send + Sync>),
}

impl FieldExtractor {
    pub fn extract(&self, body: &Value) -> Value {
        match self {
            FieldExtractor::ByName(name) => body.get(name).cloned().unwrap_or(Value::Null),
            FieldExtractor::ByFn(f) => f(body),
        }
    }
}

impl std::fmt::Debug for FieldExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldExtractor::ByName(name) => write!(f, "ByName({name})"),
            FieldExtractor::ByFn(_) => write!(f, "ByFn(..)"),
        }
    }
}

#[derive(Clone)]
pub struct FieldAggregator {
    pub name: String,
    pub field: FieldExtractor,
    pub kinds: Vec<AggKind>,
    pub window_spec: Arc<WindowSpec>,
    pub filter: Option<Arc<dyn Fn(&Value) -> bool + Send + Sync>>,
    pub max_value: Option<f64>,
    pub saturate_count: bool,
    pub late_policy: LateEventPolicy,
}

impl std::fmt::Debug for FieldAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAggregator")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("kinds", &self.kinds)
            .finish()
    }
}

impl FieldAggregator {
    pub fn new(
        name: impl Into<String>,
        field: FieldExtractor,
        kinds: Vec<AggKind>,
        window_spec: Arc<WindowSpec>,
    ) -> Result<Self, Error> {
        if kinds.is_empty() {
            return Err(Error::InvalidFieldSpec(
                "field aggregator must request at least one kind".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            field,
            kinds,
            window_spec,
            filter: None,
            max_value: None,
            saturate_count: false,
            late_policy: LateEventPolicy::Drop,
        })
    }

    pub fn by_name(
        name: impl Into<String>,
        field_name: impl Into<String>,
        kinds: Vec<AggKind>,
        window_spec: Arc<WindowSpec>,
    ) -> Result<Self, Error> {
        Self::new(name, FieldExtractor::ByName(field_name.into()), kinds, window_spec)
    }

    pub fn with_filter(mut self, filter: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_max_value(mut self, cap: f64) -> Self {
        self.max_value = Some(cap);
        self
    }

    pub fn with_saturate_count(mut self, saturate: bool) -> Self {
        self.saturate_count = saturate;
        self
    }

    pub fn with_late_policy(mut self, policy: LateEventPolicy) -> Self {
        self.late_policy = policy;
        self
    }

    /// The union of raw kinds this aggregator's bucket columns must
    /// maintain: every requested raw kind, plus the dependencies of every
    /// requested virtual kind, deduplicated with stable order.
    pub fn required_raw_kinds(&self) -> Vec<RawKind> {
        let mut out: Vec<RawKind> = Vec::new();
        for kind in &self.kinds {
            let deps: Vec<RawKind> = match kind {
                AggKind::Raw(r) => vec![*r],
                AggKind::Virtual(v) => v.dependencies().to_vec(),
            };
            for d in deps {
                if !out.contains(&d) {
                    out.push(d);
                }
            }
        }
        out
    }
}
