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

use async_trait::async_trait;

use tideflow_common::{TideflowConfig, Value};
use tideflow_stream::executor::Operator;
use tideflow_stream::{Event, GraphBuilder, StreamError};

fn int_fold() -> tideflow_stream::GraphBuilder {
    GraphBuilder::new().fold(Value::Int(0), |acc, body| match (acc, body.as_f64()) {
        (Value::Int(a), Some(b)) => Value::Int(a + b as i64),
        (acc, _) => acc,
    })
}

#[tokio::test]
async fn functional_pipeline_sums_to_3300() {
    let flow = GraphBuilder::new()
        .map(|v| match v {
            Value::Int(n) => Value::Int(n + 1),
            other => other,
        })
        .filter(|v| matches!(v, Value::Int(n) if *n < 3))
        .flat_map(|v| match v {
            Value::Int(n) => vec![Value::Int(n), Value::Int(n * 10)],
            other => vec![other],
        })
        .fold(Value::Int(0), |acc, body| match (acc, body.as_f64()) {
            (Value::Int(a), Some(b)) => Value::Int(a + b as i64),
            (acc, _) => acc,
        });

    let controller = flow.build(&TideflowConfig::default());
    for _ in 0..100 {
        for x in 0..10 {
            controller.emit(Value::Int(x), None, Some(x)).await.unwrap();
        }
    }
    controller.terminate().await.unwrap();
    let result = controller.await_termination().await.unwrap();
    assert_eq!(result, Value::Int(3300));
}

#[tokio::test]
async fn broadcast_to_two_reducers_sums_to_six() {
    let flow = GraphBuilder::new()
        .map(|v| match v {
            Value::Int(n) => Value::Int(n + 1),
            other => other,
        })
        .filter(|v| matches!(v, Value::Int(n) if *n < 3))
        .branch(vec![int_fold(), int_fold()], |a, b| match (a, b) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (a, _) => a,
        });

    let controller = flow.build(&TideflowConfig::default());
    for x in 0..10 {
        controller.emit(Value::Int(x), None, Some(x)).await.unwrap();
    }
    controller.terminate().await.unwrap();
    let result = controller.await_termination().await.unwrap();
    assert_eq!(result, Value::Int(6));
}

#[tokio::test]
async fn mixed_broadcast_sums_to_3303() {
    let identity = int_fold();
    let times_100 = GraphBuilder::new()
        .map(|v| match v {
            Value::Int(n) => Value::Int(n * 100),
            other => other,
        })
        .fold(Value::Int(0), |acc, body| match (acc, body.as_f64()) {
            (Value::Int(a), Some(b)) => Value::Int(a + b as i64),
            (acc, _) => acc,
        });
    let times_1000 = GraphBuilder::new()
        .map(|v| match v {
            Value::Int(n) => Value::Int(n * 1000),
            other => other,
        })
        .fold(Value::Int(0), |acc, body| match (acc, body.as_f64()) {
            (Value::Int(a), Some(b)) => Value::Int(a + b as i64),
            (acc, _) => acc,
        });

    let flow = GraphBuilder::new()
        .map(|v| match v {
            Value::Int(n) => Value::Int(n + 1),
            other => other,
        })
        .filter(|v| matches!(v, Value::Int(n) if *n < 3))
        .branch(vec![identity, times_100, times_1000], |a, b| match (a, b) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (a, _) => a,
        });

    let controller = flow.build(&TideflowConfig::default());
    for x in 0..10 {
        controller.emit(Value::Int(x), None, Some(x)).await.unwrap();
    }
    controller.terminate().await.unwrap();
    let result = controller.await_termination().await.unwrap();
    assert_eq!(result, Value::Int(3303));
}

struct FailOn501 {
    count: u64,
}

#[async_trait]
impl Operator for FailOn501 {
    async fn process(&mut self, event: Event) -> Result<Vec<Event>, StreamError> {
        self.count += 1;
        if self.count == 501 {
            return Err(StreamError::Internal(anyhow::anyhow!("boom at event 501")));
        }
        Ok(vec![event])
    }

    fn name(&self) -> &str {
        "fail_on_501"
    }
}

#[tokio::test]
async fn error_in_operator_surfaces_at_await_termination() {
    let flow = GraphBuilder::new()
        .to_op(FailOn501 { count: 0 })
        .sink(|_event| {});

    let controller = flow.build(&TideflowConfig::default());
    for x in 0..1000i64 {
        if controller.emit(Value::Int(x), None, Some(x)).await.is_err() {
            break;
        }
    }
    let _ = controller.terminate().await;
    let err = controller.await_termination().await.unwrap_err();
    assert!(err.0.to_string().contains("fail_on_501") || err.0.to_string().contains("boom"));
}

#[tokio::test]
async fn cancel_aborts_the_graph_instead_of_draining() {
    let flow = GraphBuilder::new().sink(|_event| {});
    let controller = flow.build(&TideflowConfig::default());
    controller.emit(Value::Int(1), None, Some(0)).await.unwrap();
    controller.cancel();
    let err = controller.await_termination().await.unwrap_err();
    assert!(err.0.to_string().contains("cancelled"));
}
