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

//! The operator runtime (§4.7): operators as tasks linked by bounded
//! channels, an in-band termination sentinel, fan-out with a user-supplied
//! combiner, and a terminal reducer that exposes the pipeline's result.

pub mod aggregator;
pub mod ops;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tideflow_common::Value;

use crate::error::StreamError;
use crate::event::Event;

/// A message on an operator's inbound channel: either a live event or the
/// in-band shutdown sentinel. The sentinel is forwarded downstream after an
/// operator finishes draining its own inbox, so shutdown propagates through
/// the whole graph without a side channel.
#[derive(Debug, Clone)]
pub enum Frame {
    Event(Event),
    Terminate,
}

/// A stateful, non-terminal processing step. `process` may emit zero, one,
/// or several events per input (`Filter` emits zero or one, `FlatMap`
/// emits any number).
#[async_trait]
pub trait Operator: Send {
    async fn process(&mut self, event: Event) -> Result<Vec<Event>, StreamError>;

    /// Called once, after the sentinel arrives and before it is forwarded,
    /// to let an operator flush any buffered state.
    async fn flush(&mut self) -> Result<Vec<Event>, StreamError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "operator"
    }
}

/// A terminal step that folds every event it sees into a single [`Value`],
/// produced once the sentinel arrives.
#[async_trait]
pub trait Reducer: Send {
    async fn step(&mut self, event: Event) -> Result<(), StreamError>;
    fn finish(&mut self) -> Value;
    fn name(&self) -> &str {
        "reducer"
    }
}

/// Lifecycle states a node task moves through; logged at each transition
/// (ambient observability, §10.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    Idle,
    Running,
    Draining,
    Terminated,
    Failed,
}

pub(crate) type FailureSlot = Arc<Mutex<Option<StreamError>>>;

/// Shared bookkeeping threaded through a graph's spawn pass.
pub struct GraphCtx {
    pub(crate) queue_depth: usize,
    pub(crate) failure: FailureSlot,
    pub(crate) handles: Vec<JoinHandle<()>>,
}

impl GraphCtx {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth,
            failure: Arc::new(Mutex::new(None)),
            handles: Vec::new(),
        }
    }

    pub(crate) fn spawn(&mut self, fut: impl std::future::Future<Output = ()> + Send + 'static) {
        self.handles.push(tokio::spawn(fut));
    }
}

pub(crate) fn record_failure(failure: &FailureSlot, operator: &str, source: StreamError) {
    let mut guard = failure.lock();
    if guard.is_none() {
        tracing::warn!(operator, error = %source, "operator failed, cancelling pipeline");
        *guard = Some(StreamError::OperatorFailure {
            operator: operator.to_string(),
            source: anyhow::anyhow!(source.to_string()),
        });
    }
}

/// One node in the built graph, ready to be spawned.
pub enum Node {
    Operator {
        op: Box<dyn Operator>,
        child: Box<Node>,
    },
    Aggregator {
        agg: aggregator::AggregatorOperator,
        child: Box<Node>,
    },
    FanOut {
        children: Vec<Node>,
        combine: Box<dyn Fn(Value, Value) -> Value + Send>,
    },
    Reducer(Box<dyn Reducer>),
}

impl Node {
    pub fn spawn(self, ctx: &mut GraphCtx) -> (mpsc::Sender<Frame>, Option<oneshot::Receiver<Value>>) {
        match self {
            Node::Reducer(reducer) => spawn_reducer(reducer, ctx),
            Node::Operator { op, child } => {
                let (child_tx, child_result) = child.spawn(ctx);
                let (tx, rx) = mpsc::channel(ctx.queue_depth);
                let failure = ctx.failure.clone();
                ctx.spawn(run_operator(op, rx, child_tx, failure));
                (tx, child_result)
            }
            Node::Aggregator { agg, child } => {
                let (child_tx, child_result) = child.spawn(ctx);
                let tx = aggregator::spawn(agg, child_tx, ctx);
                (tx, child_result)
            }
            Node::FanOut { children, combine } => {
                let mut senders = Vec::with_capacity(children.len());
                let mut results = Vec::new();
                for c in children {
                    let (s, r) = c.spawn(ctx);
                    senders.push(s);
                    if let Some(r) = r {
                        results.push(r);
                    }
                }
                let (tx, rx) = mpsc::channel(ctx.queue_depth);
                let failure = ctx.failure.clone();
                ctx.spawn(run_fanout(rx, senders, failure));
                let (result_tx, result_rx) = oneshot::channel();
                ctx.spawn(run_combine(results, combine, result_tx));
                (tx, Some(result_rx))
            }
        }
    }
}

async fn run_operator(
    mut op: Box<dyn Operator>,
    mut rx: mpsc::Receiver<Frame>,
    downstream: mpsc::Sender<Frame>,
    failure: FailureSlot,
) {
    let name = op.name().to_string();
    let mut state = OperatorState::Idle;
    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Event(ev) => {
                state = OperatorState::Running;
                match op.process(ev).await {
                    Ok(events) => {
                        for e in events {
                            if downstream.send(Frame::Event(e)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        record_failure(&failure, &name, err);
                        let _ = downstream.send(Frame::Terminate).await;
                        tracing::debug!(operator = %name, state = ?OperatorState::Failed, "operator terminated");
                        return;
                    }
                }
            }
            Frame::Terminate => {
                state = OperatorState::Draining;
                match op.flush().await {
                    Ok(events) => {
                        for e in events {
                            if downstream.send(Frame::Event(e)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        record_failure(&failure, &name, err);
                        let _ = downstream.send(Frame::Terminate).await;
                        tracing::debug!(operator = %name, state = ?OperatorState::Failed, "operator terminated");
                        return;
                    }
                }
                let _ = downstream.send(Frame::Terminate).await;
                state = OperatorState::Terminated;
                tracing::debug!(operator = %name, ?state, "operator terminated");
                return;
            }
        }
    }
}

async fn run_fanout(mut rx: mpsc::Receiver<Frame>, downstream: Vec<mpsc::Sender<Frame>>, _failure: FailureSlot) {
    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Event(ev) => {
                for d in &downstream {
                    let _ = d.send(Frame::Event(ev.clone())).await;
                }
            }
            Frame::Terminate => {
                for d in &downstream {
                    let _ = d.send(Frame::Terminate).await;
                }
                return;
            }
        }
    }
}

async fn run_combine(
    results: Vec<oneshot::Receiver<Value>>,
    combine: Box<dyn Fn(Value, Value) -> Value + Send>,
    out: oneshot::Sender<Value>,
) {
    let mut acc: Option<Value> = None;
    for r in results {
        if let Ok(v) = r.await {
            acc = Some(match acc {
                None => v,
                Some(a) => combine(a, v),
            });
        }
    }
    let _ = out.send(acc.unwrap_or(Value::Null));
}

fn spawn_reducer(reducer: Box<dyn Reducer>, ctx: &mut GraphCtx) -> (mpsc::Sender<Frame>, Option<oneshot::Receiver<Value>>) {
    let (tx, rx) = mpsc::channel(ctx.queue_depth);
    let (result_tx, result_rx) = oneshot::channel();
    let failure = ctx.failure.clone();
    ctx.spawn(run_reducer(reducer, rx, result_tx, failure));
    (tx, Some(result_rx))
}

async fn run_reducer(
    mut reducer: Box<dyn Reducer>,
    mut rx: mpsc::Receiver<Frame>,
    out: oneshot::Sender<Value>,
    failure: FailureSlot,
) {
    let name = reducer.name().to_string();
    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Event(ev) => {
                if let Err(err) = reducer.step(ev).await {
                    record_failure(&failure, &name, err);
                    break;
                }
            }
            Frame::Terminate => break,
        }
    }
    let _ = out.send(reducer.finish());
}
