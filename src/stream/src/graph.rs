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

//! Assembles operators, the aggregator, and reducers into a runnable graph
//! (§4.10). Built top-down with a fluent builder, then folded bottom-up into
//! a [`Node`] tree and spawned as one task per node.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tideflow_common::{TideflowConfig, Value};

use crate::error::{FlowError, StreamError, StreamResult};
use crate::event::Event;
use crate::executor::aggregator::AggregatorOperator;
use crate::executor::ops::{FilterOperator, FlatMapOperator, FoldReducer, MapOperator, SinkReducer};
use crate::executor::{Frame, GraphCtx, Node, Operator, Reducer};
use crate::util::now_ms;

type CombineFn = Box<dyn Fn(Value, Value) -> Value + Send>;

enum Step {
    Op(Box<dyn Operator>),
    Aggregator(AggregatorOperator),
    FanOut(Vec<GraphBuilder>, CombineFn),
    Reducer(Box<dyn Reducer>),
}

/// A top-down fluent builder for a dataflow graph. Every chain must end in
/// either [`Self::reduce`]/[`Self::sink`] or a [`Self::branch`] whose arms
/// each end that way.
#[derive(Default)]
pub struct GraphBuilder {
    steps: Vec<Step>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn to_op(mut self, op: impl Operator + 'static) -> Self {
        self.steps.push(Step::Op(Box::new(op)));
        self
    }

    pub fn map(self, f: impl Fn(Value) -> Value + Send + 'static) -> Self {
        self.to_op(MapOperator::new(f))
    }

    pub fn filter(self, predicate: impl Fn(&Value) -> bool + Send + 'static) -> Self {
        self.to_op(FilterOperator::new(predicate))
    }

    pub fn flat_map(self, f: impl Fn(Value) -> Vec<Value> + Send + 'static) -> Self {
        self.to_op(FlatMapOperator::new(f))
    }

    pub fn aggregate(mut self, agg: AggregatorOperator) -> Self {
        self.steps.push(Step::Aggregator(agg));
        self
    }

    /// Duplicates every event across `branches`, each a full sub-chain
    /// ending in its own reducer, and folds their terminal results with
    /// `combine` into the single value this fan-out exposes upward.
    pub fn branch(
        mut self,
        branches: Vec<GraphBuilder>,
        combine: impl Fn(Value, Value) -> Value + Send + 'static,
    ) -> Self {
        self.steps.push(Step::FanOut(branches, Box::new(combine)));
        self
    }

    pub fn reduce(mut self, reducer: impl Reducer + 'static) -> Self {
        self.steps.push(Step::Reducer(Box::new(reducer)));
        self
    }

    /// A fold over every event's body, exposed as the terminal result.
    pub fn fold(self, init: Value, f: impl FnMut(Value, &Value) -> Value + Send + 'static) -> Self {
        self.reduce(FoldReducer::new(init, f))
    }

    /// A side-effecting terminal step with no meaningful result
    /// (`await_termination` resolves to `Value::Null`).
    pub fn sink(self, f: impl FnMut(Event) + Send + 'static) -> Self {
        self.reduce(SinkReducer::new(f))
    }

    fn into_node(self) -> Node {
        let mut steps = self.steps;
        let mut current: Option<Node> = None;
        while let Some(step) = steps.pop() {
            current = Some(match step {
                Step::Reducer(r) => Node::Reducer(r),
                Step::Aggregator(agg) => Node::Aggregator {
                    agg,
                    child: Box::new(current.take().expect("aggregate() must be followed by a downstream step")),
                },
                Step::Op(op) => Node::Operator {
                    op,
                    child: Box::new(current.take().expect("an operator must be followed by a downstream step")),
                },
                Step::FanOut(branches, combine) => {
                    assert!(
                        current.is_none(),
                        "branch() must be the last step in its chain"
                    );
                    Node::FanOut {
                        children: branches.into_iter().map(|b| b.into_node()).collect(),
                        combine,
                    }
                }
            });
        }
        current.expect("a graph must have at least one step ending in a reducer or a branch")
    }

    /// Spawns every node and returns the [`Controller`] that feeds and
    /// drains the graph.
    pub fn build(self, config: &TideflowConfig) -> Controller {
        let node = self.into_node();
        let mut ctx = GraphCtx::new(config.operator_queue_depth);
        let (tx, result_rx) = node.spawn(&mut ctx);
        Controller {
            tx,
            result_rx,
            failure: ctx.failure,
            handles: ctx.handles,
        }
    }
}

/// The handle returned by [`GraphBuilder::build`]: the graph's single entry
/// point, plus the means to observe its outcome.
pub struct Controller {
    tx: tokio::sync::mpsc::Sender<Frame>,
    result_rx: Option<oneshot::Receiver<Value>>,
    failure: std::sync::Arc<Mutex<Option<StreamError>>>,
    handles: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Pushes one event into the graph's source, blocking cooperatively
    /// when every operator's queue ahead is full.
    pub async fn emit(
        &self,
        body: impl Into<Value>,
        key: Option<String>,
        time_ms: Option<i64>,
    ) -> StreamResult<()> {
        let event = Event {
            body: body.into(),
            key,
            time_ms: time_ms.unwrap_or_else(now_ms),
            id: None,
        };
        self.tx
            .send(Frame::Event(event))
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Sends the in-band shutdown sentinel. The graph only ever finishes
    /// draining after this is called.
    pub async fn terminate(&self) -> StreamResult<()> {
        self.tx.send(Frame::Terminate).await.map_err(|_| StreamError::Closed)
    }

    /// Aborts every node task immediately, bypassing the cooperative drain
    /// `terminate` triggers. `await_termination` subsequently fails with a
    /// `Cancelled` cause rather than draining to a reducer result.
    pub fn cancel(&self) {
        for handle in &self.handles {
            handle.abort();
        }
        let mut guard = self.failure.lock();
        if guard.is_none() {
            *guard = Some(StreamError::Internal(anyhow::anyhow!("pipeline cancelled")));
        }
    }

    /// Waits for every node to wind down, then returns the combined reducer
    /// result, or the first operator failure observed anywhere in the
    /// graph.
    pub async fn await_termination(self) -> Result<Value, FlowError> {
        for handle in self.handles {
            let _ = handle.await;
        }
        if let Some(err) = self.failure.lock().take() {
            return Err(FlowError(err));
        }
        match self.result_rx {
            Some(rx) => rx.await.map_err(|_| FlowError(StreamError::Closed)),
            None => Ok(Value::Null),
        }
    }
}
