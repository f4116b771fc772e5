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

//! The small built-in operator set: stateless transforms over an event's
//! body, and a couple of terminal reducers.

use async_trait::async_trait;
use tideflow_common::Value;

use crate::error::StreamError;
use crate::event::Event;
use crate::executor::{Operator, Reducer};

pub struct MapOperator<F> {
    f: F,
}

impl<F: Fn(Value) -> Value + Send + 'static> MapOperator<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F: Fn(Value) -> Value + Send + 'static> Operator for MapOperator<F> {
    async fn process(&mut self, mut event: Event) -> Result<Vec<Event>, StreamError> {
        event.body = (self.f)(event.body);
        Ok(vec![event])
    }

    fn name(&self) -> &str {
        "map"
    }
}

pub struct FilterOperator<F> {
    predicate: F,
}

impl<F: Fn(&Value) -> bool + Send + 'static> FilterOperator<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F: Fn(&Value) -> bool + Send + 'static> Operator for FilterOperator<F> {
    async fn process(&mut self, event: Event) -> Result<Vec<Event>, StreamError> {
        if (self.predicate)(&event.body) {
            Ok(vec![event])
        } else {
            Ok(Vec::new())
        }
    }

    fn name(&self) -> &str {
        "filter"
    }
}

pub struct FlatMapOperator<F> {
    f: F,
}

impl<F: Fn(Value) -> Vec<Value> + Send + 'static> FlatMapOperator<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F: Fn(Value) -> Vec<Value> + Send + 'static> Operator for FlatMapOperator<F> {
    async fn process(&mut self, event: Event) -> Result<Vec<Event>, StreamError> {
        let bodies = (self.f)(event.body);
        Ok(bodies
            .into_iter()
            .map(|body| Event {
                body,
                key: event.key.clone(),
                time_ms: event.time_ms,
                id: event.id.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "flat_map"
    }
}

/// Accumulates every event's body via a user fold function, exposing the
/// running accumulator as the reducer's final [`Value`].
pub struct FoldReducer<F> {
    acc: Value,
    f: F,
}

impl<F: FnMut(Value, &Value) -> Value + Send> FoldReducer<F> {
    pub fn new(init: Value, f: F) -> Self {
        Self { acc: init, f }
    }
}

#[async_trait]
impl<F: FnMut(Value, &Value) -> Value + Send> Reducer for FoldReducer<F> {
    async fn step(&mut self, event: Event) -> Result<(), StreamError> {
        let acc = std::mem::replace(&mut self.acc, Value::Null);
        self.acc = (self.f)(acc, &event.body);
        Ok(())
    }

    fn finish(&mut self) -> Value {
        std::mem::replace(&mut self.acc, Value::Null)
    }

    fn name(&self) -> &str {
        "reduce"
    }
}

/// A side-effecting terminal step that runs a closure per event and
/// produces `Value::Null`.
pub struct SinkReducer<F> {
    f: F,
}

impl<F: FnMut(Event) + Send> SinkReducer<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F: FnMut(Event) + Send> Reducer for SinkReducer<F> {
    async fn step(&mut self, event: Event) -> Result<(), StreamError> {
        (self.f)(event);
        Ok(())
    }

    fn finish(&mut self) -> Value {
        Value::Null
    }

    fn name(&self) -> &str {
        "sink"
    }
}
