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

//! Two small demo pipelines wiring the crates together, in lieu of the
//! teacher's own `examples/` directory (left behind so it does not collide
//! with the read-only retrieval pack).

use anyhow::Result;

use tideflow_common::{TideflowConfig, Value, WindowSpec};
use tideflow_stream::aggregation::{AggKind, FieldAggregator};
use tideflow_stream::emission::{EmissionPolicy, EmissionType};
use tideflow_stream::executor::aggregator::AggregatorOperator;
use tideflow_stream::GraphBuilder;

/// `source.map(x -> x+1).filter(x<8).branch([sum, sum], |a,b| a+b)`: three
/// independent reducer branches, combined into one result at the
/// controller.
pub async fn run_numeric_demo(config: &TideflowConfig, count: i64) -> Result<()> {
    let branch = || {
        GraphBuilder::new().fold(Value::Int(0), |acc, body| {
            let inc = body.as_f64().unwrap_or(0.0) as i64;
            match acc {
                Value::Int(a) => Value::Int(a + inc),
                other => other,
            }
        })
    };

    let flow = GraphBuilder::new()
        .map(|v| match v {
            Value::Int(n) => Value::Int(n + 1),
            other => other,
        })
        .filter(|v| matches!(v, Value::Int(n) if *n < 8))
        .branch(vec![branch(), branch()], |a, b| match (a, b) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (a, _) => a,
        });

    let controller = flow.build(config);
    for i in 0..count {
        controller.emit(Value::Int(i), None, Some(i)).await?;
    }
    controller.terminate().await?;
    let result = controller.await_termination().await.map_err(anyhow::Error::from)?;
    tracing::info!(?result, "numeric demo finished");
    Ok(())
}

/// Aggregates synthetic price events over sliding 1h/2h windows, emitting a
/// feature snapshot after every event.
pub async fn run_aggregate_demo(config: &TideflowConfig, events: i64) -> Result<()> {
    let spec = std::sync::Arc::new(WindowSpec::sliding_with_buckets_per_window(
        &["1h", "2h"],
        None,
        config.buckets_per_window,
    )?);
    let field = FieldAggregator::by_name(
        "price",
        "price",
        vec![AggKind::parse("sum")?, AggKind::parse("avg")?],
        spec,
    )?;
    let agg = AggregatorOperator::new(vec![field], EmissionPolicy::EveryEvent, EmissionType::All)?;

    let flow = GraphBuilder::new().aggregate(agg).sink(move |event| {
        tracing::info!(key = event.key_or_default(), body = %event.body, "sink");
    });

    let controller = flow.build(config);
    for i in 0..events {
        let mut body = Value::map();
        body.insert("price", Value::Int(i % 7));
        controller.emit(body, Some("sensor-1".into()), Some(i * 60_000)).await?;
    }
    controller.terminate().await?;
    controller.await_termination().await.map_err(anyhow::Error::from)?;
    Ok(())
}
