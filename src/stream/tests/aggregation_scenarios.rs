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

use std::sync::{Arc, Mutex};

use tideflow_common::{TideflowConfig, Value, WindowSpec};
use tideflow_stream::aggregation::{AggKind, FieldAggregator};
use tideflow_stream::emission::{EmissionPolicy, EmissionType};
use tideflow_stream::executor::aggregator::AggregatorOperator;
use tideflow_stream::GraphBuilder;

const ONE_MINUTE_MS: i64 = 60_000;

fn feature(body: &Value, key: &str) -> f64 {
    body.get(key)
        .and_then(Value::as_f64)
        .unwrap_or_else(|| panic!("missing feature {key} in {body:?}"))
}

#[tokio::test]
async fn simple_aggregation_sums_and_averages_over_a_sliding_window() {
    let spec = Arc::new(WindowSpec::sliding(&["1h", "2h", "24h"], Some("10m")).unwrap());
    let field = FieldAggregator::by_name(
        "n",
        "col1",
        vec![
            AggKind::parse("sum").unwrap(),
            AggKind::parse("count").unwrap(),
            AggKind::parse("avg").unwrap(),
        ],
        spec,
    )
    .unwrap();
    let agg = AggregatorOperator::new(vec![field], EmissionPolicy::EveryEvent, EmissionType::All).unwrap();

    let last = Arc::new(Mutex::new(None::<Value>));
    let last_write = last.clone();
    let flow = GraphBuilder::new().aggregate(agg).sink(move |event| {
        *last_write.lock().unwrap() = Some(event.body);
    });

    let controller = flow.build(&TideflowConfig::default());
    for i in 0..10i64 {
        let mut body = Value::map();
        body.insert("col1", Value::Int(i));
        controller
            .emit(body, Some("tal".into()), Some(i * ONE_MINUTE_MS))
            .await
            .unwrap();
    }
    controller.terminate().await.unwrap();
    controller.await_termination().await.unwrap();

    let final_body = last.lock().unwrap().take().expect("at least one event reached the sink");
    for window in ["1h", "2h", "24h"] {
        assert_eq!(feature(&final_body, &format!("n_sum_{window}")), 45.0);
        assert_eq!(feature(&final_body, &format!("n_count_{window}")), 10.0);
        assert_eq!(feature(&final_body, &format!("n_avg_{window}")), 4.5);
    }
}

#[tokio::test]
async fn filtered_aggregation_only_counts_events_passing_the_predicate() {
    let spec = Arc::new(WindowSpec::sliding(&["1h", "2h", "24h"], Some("10m")).unwrap());
    let field = FieldAggregator::by_name(
        "n",
        "col1",
        vec![AggKind::parse("sum").unwrap(), AggKind::parse("count").unwrap()],
        spec,
    )
    .unwrap()
    .with_filter(|body| matches!(body.get("is_valid").and_then(Value::as_f64), Some(v) if v == 0.0));
    let agg = AggregatorOperator::new(vec![field], EmissionPolicy::EveryEvent, EmissionType::All).unwrap();

    let last = Arc::new(Mutex::new(None::<Value>));
    let last_write = last.clone();
    let flow = GraphBuilder::new().aggregate(agg).sink(move |event| {
        *last_write.lock().unwrap() = Some(event.body);
    });

    let controller = flow.build(&TideflowConfig::default());
    for i in 0..10i64 {
        let mut body = Value::map();
        body.insert("col1", Value::Int(i));
        body.insert("is_valid", Value::Int(i % 2));
        controller
            .emit(body, Some("tal".into()), Some(i * ONE_MINUTE_MS))
            .await
            .unwrap();
    }
    controller.terminate().await.unwrap();
    controller.await_termination().await.unwrap();

    let final_body = last.lock().unwrap().take().expect("at least one event reached the sink");
    assert_eq!(feature(&final_body, "n_count_1h"), 5.0);
    assert_eq!(feature(&final_body, "n_sum_1h"), 20.0);
}
