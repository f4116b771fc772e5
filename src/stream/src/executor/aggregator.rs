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

//! The windowed aggregator node (§4.8): aggregates every event into the
//! keyed store, then decides whether to emit a feature snapshot per the
//! configured [`EmissionPolicy`]. `AfterPeriod`/`AfterWindow` drive a
//! background ticker that shares the store through a mutex rather than a
//! second owner, since the ticker and the per-event path must never observe
//! a torn aggregate-then-emit for the same key.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use tideflow_common::{Value, WindowSpec};

use crate::aggregation::{AggregateStore, FieldAggregator};
use crate::emission::{EmissionPolicy, EmissionType};
use crate::error::{StreamError, StreamResult};
use crate::event::Event;
use crate::executor::{Frame, GraphCtx};
use crate::util::now_ms;

type AugmentFn = Arc<dyn Fn(&Value, &BTreeMap<String, Value>) -> Value + Send + Sync>;
type KeyFn = Arc<dyn Fn(&Event) -> String + Send + Sync>;

fn default_augment(body: &Value, features: &BTreeMap<String, Value>) -> Value {
    let mut out = body.clone();
    for (k, v) in features {
        out.insert(k.clone(), v.clone());
    }
    out
}

struct AggregatorInner {
    store: AggregateStore,
    event_counts: HashMap<String, u64>,
    baselines: HashMap<String, HashMap<String, u64>>,
    last_time: HashMap<String, i64>,
}

pub struct AggregatorOperator {
    inner: Arc<Mutex<AggregatorInner>>,
    policy: EmissionPolicy,
    emission_type: EmissionType,
    augment: AugmentFn,
    key_fn: KeyFn,
    ticker_spec: Option<Arc<WindowSpec>>,
}

impl AggregatorOperator {
    pub fn new(fields: Vec<FieldAggregator>, policy: EmissionPolicy, emission_type: EmissionType) -> StreamResult<Self> {
        let ticker_spec = if policy.needs_ticker() {
            Some(validate_shared_window_spec(&fields)?)
        } else {
            None
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(AggregatorInner {
                store: AggregateStore::new(fields),
                event_counts: HashMap::new(),
                baselines: HashMap::new(),
                last_time: HashMap::new(),
            })),
            policy,
            emission_type,
            augment: Arc::new(default_augment),
            key_fn: Arc::new(|ev: &Event| ev.key_or_default().to_string()),
            ticker_spec,
        })
    }

    pub fn with_augment_fn(
        mut self,
        f: impl Fn(&Value, &BTreeMap<String, Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.augment = Arc::new(f);
        self
    }

    pub fn with_key_fn(mut self, f: impl Fn(&Event) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Arc::new(f);
        self
    }

    /// Resolves the aggregation key from a named body field instead of the
    /// event's own key, falling back to [`Event::key_or_default`] when the
    /// field is absent on a given event.
    pub fn with_key_field(mut self, field_name: impl Into<String>) -> StreamResult<Self> {
        let field_name = field_name.into();
        if field_name.is_empty() {
            return Err(StreamError::Config(tideflow_common::Error::InvalidKeySpec(
                "key field name must be non-empty".into(),
            )));
        }
        self.key_fn = Arc::new(move |ev: &Event| {
            ev.body
                .get(&field_name)
                .map(|v| v.to_string())
                .unwrap_or_else(|| ev.key_or_default().to_string())
        });
        Ok(self)
    }
}

fn validate_shared_window_spec(fields: &[FieldAggregator]) -> StreamResult<Arc<WindowSpec>> {
    let first = fields
        .first()
        .map(|f| f.window_spec.clone())
        .ok_or_else(|| StreamError::UnsupportedEmissionPolicy("aggregator must have at least one field".into()))?;
    for f in fields {
        if *f.window_spec != *first {
            return Err(StreamError::UnsupportedEmissionPolicy(
                "AfterPeriod/AfterWindow require every field aggregator to share one window spec".into(),
            ));
        }
    }
    Ok(first)
}

/// Spawns the aggregator's main loop and returns the sender the preceding
/// node forwards events into. The background ticker for `AfterPeriod`/
/// `AfterWindow`, if any, is not started here: the loop spawns it lazily
/// off the first event that requires it.
pub fn spawn(agg: AggregatorOperator, downstream: mpsc::Sender<Frame>, ctx: &mut GraphCtx) -> mpsc::Sender<Frame> {
    let (tx, rx) = mpsc::channel(ctx.queue_depth);
    ctx.spawn(run_aggregator_loop(agg, rx, downstream));
    tx
}

fn ticker_interval_ms(policy: EmissionPolicy, spec: &WindowSpec) -> (i64, i64) {
    match policy {
        EmissionPolicy::AfterPeriod { delay_ms } => (spec.period_ms(), delay_ms),
        EmissionPolicy::AfterWindow { delay_ms } => (spec.smallest_window_ms(), delay_ms),
        _ => unreachable!("ticker_spec only set for ticker-driven policies"),
    }
}

/// Spawns the background ticker as a detached task, matching the
/// fire-and-forget worker the per-event loop never joins on shutdown: it
/// is told to stop via `stop_rx` and may still be mid-emission when the
/// loop itself returns.
fn spawn_ticker(agg: &AggregatorOperator, downstream: mpsc::Sender<Frame>) -> Option<oneshot::Sender<()>> {
    let spec = agg.ticker_spec.clone()?;
    let (interval_ms, delay_ms) = ticker_interval_ms(agg.policy, &spec);
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(run_ticker(
        agg.inner.clone(),
        interval_ms,
        delay_ms,
        downstream,
        agg.augment.clone(),
        agg.emission_type,
        stop_rx,
    ));
    Some(stop_tx)
}

fn compute_features(
    inner: &Mutex<AggregatorInner>,
    key: &str,
    t: i64,
    emission_type: EmissionType,
) -> Option<BTreeMap<String, Value>> {
    let mut guard = inner.lock();
    guard.last_time.insert(key.to_string(), t);
    let features = guard.store.features_at(key, t)?;
    match emission_type {
        EmissionType::All => Some(features),
        EmissionType::Incremental => {
            let baseline = guard.baselines.entry(key.to_string()).or_default().clone();
            let changed_keys = guard.store.changed_feature_keys(key, &baseline);
            let snapshot = guard.store.kind_versions(key);
            guard.baselines.insert(key.to_string(), snapshot);
            if changed_keys.is_empty() {
                return None;
            }
            let changed: std::collections::HashSet<&str> = changed_keys.iter().map(String::as_str).collect();
            Some(
                features
                    .into_iter()
                    .filter(|(k, _)| changed.contains(k.as_str()))
                    .collect(),
            )
        }
    }
}

/// Anchors the first tick to `ceil(now / interval) * interval`, then
/// advances by a fixed `interval_ms` every round rather than resyncing to
/// wall time on each wake-up, so the schedule doesn't drift under load.
/// Each sleep additionally waits out `delay_ms` past the boundary.
async fn run_ticker(
    inner: Arc<Mutex<AggregatorInner>>,
    interval_ms: i64,
    delay_ms: i64,
    downstream: mpsc::Sender<Frame>,
    augment: AugmentFn,
    emission_type: EmissionType,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let interval_ms = interval_ms.max(1);
    let mut next_emit_time = (now_ms().div_euclid(interval_ms) + 1) * interval_ms;
    loop {
        let sleep_ms = (next_emit_time - now_ms() + delay_ms).max(0);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(sleep_ms as u64)) => {}
            _ = &mut stop_rx => return,
        }
        let boundary = next_emit_time;
        let keys: Vec<String> = inner.lock().store.keys().cloned().collect();
        for key in keys {
            if let Some(features) = compute_features(&inner, &key, boundary, emission_type) {
                let body = augment(&Value::Null, &features);
                let event = Event {
                    body,
                    key: Some(key),
                    time_ms: boundary,
                    id: None,
                };
                if downstream.send(Frame::Event(event)).await.is_err() {
                    return;
                }
            }
        }
        next_emit_time += interval_ms;
    }
}

async fn run_aggregator_loop(agg: AggregatorOperator, mut rx: mpsc::Receiver<Frame>, downstream: mpsc::Sender<Frame>) {
    let mut stop_ticker: Option<oneshot::Sender<()>> = None;

    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Event(ev) => {
                // Mirrors the original's `_emit_worker_running` check: the
                // ticker is started off the first event that needs one,
                // never unconditionally at graph-build time.
                if stop_ticker.is_none() && agg.policy.needs_ticker() {
                    stop_ticker = spawn_ticker(&agg, downstream.clone());
                }

                let key = (agg.key_fn)(&ev);
                let t = ev.time_ms;
                {
                    let mut guard = agg.inner.lock();
                    guard.store.aggregate(&key, &ev.body, t);
                }

                let triggered = match agg.policy {
                    EmissionPolicy::EveryEvent | EmissionPolicy::AfterDelay { .. } => true,
                    EmissionPolicy::AfterMaxEvent(n) => {
                        let mut guard = agg.inner.lock();
                        let count = guard.event_counts.entry(key.clone()).or_insert(0);
                        *count += 1;
                        if *count >= n {
                            *count = 0;
                            true
                        } else {
                            false
                        }
                    }
                    EmissionPolicy::AfterPeriod { .. } | EmissionPolicy::AfterWindow { .. } => false,
                };

                if !triggered {
                    continue;
                }

                if let EmissionPolicy::AfterDelay { delay_ms } = agg.policy {
                    let inner = agg.inner.clone();
                    let downstream = downstream.clone();
                    let augment = agg.augment.clone();
                    let emission_type = agg.emission_type;
                    let base_body = ev.body.clone();
                    let key = key.clone();
                    let id = ev.id.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms.max(0) as u64)).await;
                        if let Some(features) = compute_features(&inner, &key, t, emission_type) {
                            let body = augment(&base_body, &features);
                            let event = Event {
                                body,
                                key: Some(key),
                                time_ms: t,
                                id,
                            };
                            let _ = downstream.send(Frame::Event(event)).await;
                        }
                    });
                } else if let Some(features) = compute_features(&agg.inner, &key, t, agg.emission_type) {
                    let body = (agg.augment)(&ev.body, &features);
                    let event = Event {
                        body,
                        key: Some(key),
                        time_ms: t,
                        id: ev.id.clone(),
                    };
                    if downstream.send(Frame::Event(event)).await.is_err() {
                        return;
                    }
                }
            }
            Frame::Terminate => {
                if let Some(stop) = stop_ticker.take() {
                    let _ = stop.send(());
                }
                let pending: Vec<(String, i64)> = {
                    let guard = agg.inner.lock();
                    guard
                        .store
                        .keys()
                        .map(|k| (k.clone(), *guard.last_time.get(k).unwrap_or(&0)))
                        .collect()
                };
                let drains_pending_state = matches!(
                    agg.policy,
                    EmissionPolicy::AfterMaxEvent(_)
                        | EmissionPolicy::AfterPeriod { .. }
                        | EmissionPolicy::AfterWindow { .. }
                );
                if drains_pending_state {
                    for (key, t) in pending {
                        if let Some(features) = compute_features(&agg.inner, &key, t, agg.emission_type) {
                            let body = (agg.augment)(&Value::Null, &features);
                            let event = Event {
                                body,
                                key: Some(key),
                                time_ms: t,
                                id: None,
                            };
                            let _ = downstream.send(Frame::Event(event)).await;
                        }
                    }
                }
                let _ = downstream.send(Frame::Terminate).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::aggregation::{AggKind, FieldAggregator};
    use crate::graph::GraphBuilder;
    use tideflow_common::TideflowConfig;

    fn one_field() -> Vec<FieldAggregator> {
        let spec = Arc::new(WindowSpec::sliding(&["1h"], Some("10m")).unwrap());
        vec![FieldAggregator::by_name("n", "col1", vec![AggKind::parse("sum").unwrap()], spec).unwrap()]
    }

    #[test]
    fn rejects_empty_key_field_name() {
        let agg = AggregatorOperator::new(one_field(), EmissionPolicy::EveryEvent, EmissionType::All).unwrap();
        let err = agg.with_key_field("").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Config(tideflow_common::Error::InvalidKeySpec(_))
        ));
    }

    #[test]
    fn after_period_requires_a_single_shared_window_spec() {
        let spec_a = Arc::new(WindowSpec::sliding(&["1h"], Some("10m")).unwrap());
        let spec_b = Arc::new(WindowSpec::sliding(&["2h"], Some("10m")).unwrap());
        let fields = vec![
            FieldAggregator::by_name("a", "col_a", vec![AggKind::parse("sum").unwrap()], spec_a).unwrap(),
            FieldAggregator::by_name("b", "col_b", vec![AggKind::parse("sum").unwrap()], spec_b).unwrap(),
        ];
        let err = AggregatorOperator::new(fields, EmissionPolicy::AfterPeriod { delay_ms: 0 }, EmissionType::All)
            .unwrap_err();
        assert!(matches!(err, StreamError::UnsupportedEmissionPolicy(_)));
    }

    #[tokio::test]
    async fn after_period_ticker_emits_without_a_triggering_event() {
        let spec = Arc::new(WindowSpec::sliding(&["1h"], Some("1s")).unwrap());
        let field = FieldAggregator::by_name("n", "col1", vec![AggKind::parse("sum").unwrap()], spec).unwrap();
        let agg =
            AggregatorOperator::new(vec![field], EmissionPolicy::AfterPeriod { delay_ms: 0 }, EmissionType::All)
                .unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_write = seen.clone();
        let flow = GraphBuilder::new().aggregate(agg).sink(move |event| {
            seen_write.lock().unwrap().push(event.body);
        });

        let controller = flow.build(&TideflowConfig::default());
        let mut body = Value::map();
        body.insert("col1", Value::Int(7));
        controller.emit(body, Some("k1".into()), None).await.unwrap();

        // The ticker only starts once the first qualifying event has gone
        // through, so give its first aligned tick time to fire before
        // terminating the graph.
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        controller.terminate().await.unwrap();
        controller.await_termination().await.unwrap();

        let events = seen.lock().unwrap();
        assert!(!events.is_empty(), "ticker never emitted for the aggregated key");
        for body in events.iter() {
            assert_eq!(body.get("n_sum_1h").and_then(Value::as_f64), Some(7.0));
        }
    }

    #[tokio::test]
    async fn after_window_ticker_uses_the_smallest_window_as_its_interval() {
        // The ticker fires once per smallest window length (here 1s), so by
        // the time it ticks the 1s window may have already rolled past a
        // single isolated sample; the 1h window can't, so it's what proves
        // the ticker captured the right value.
        let spec = Arc::new(WindowSpec::sliding(&["1s", "1h"], Some("100ms")).unwrap());
        let field = FieldAggregator::by_name("n", "col1", vec![AggKind::parse("sum").unwrap()], spec).unwrap();
        let agg =
            AggregatorOperator::new(vec![field], EmissionPolicy::AfterWindow { delay_ms: 0 }, EmissionType::All)
                .unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_write = seen.clone();
        let flow = GraphBuilder::new().aggregate(agg).sink(move |event| {
            seen_write.lock().unwrap().push(event.body);
        });

        let controller = flow.build(&TideflowConfig::default());
        let mut body = Value::map();
        body.insert("col1", Value::Int(3));
        controller.emit(body, Some("k1".into()), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        controller.terminate().await.unwrap();
        controller.await_termination().await.unwrap();

        let events = seen.lock().unwrap();
        assert!(!events.is_empty(), "ticker never emitted for the aggregated key");
        for body in events.iter() {
            assert_eq!(body.get("n_sum_1h").and_then(Value::as_f64), Some(3.0));
        }
    }

    #[tokio::test]
    async fn incremental_emission_only_reports_changed_fields() {
        let spec = Arc::new(WindowSpec::sliding(&["1h"], Some("10m")).unwrap());
        let field_a = FieldAggregator::by_name("a", "col_a", vec![AggKind::parse("sum").unwrap()], spec.clone()).unwrap();
        let field_b = FieldAggregator::by_name("b", "col_b", vec![AggKind::parse("sum").unwrap()], spec).unwrap();
        let agg = AggregatorOperator::new(
            vec![field_a, field_b],
            EmissionPolicy::EveryEvent,
            EmissionType::Incremental,
        )
        .unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_write = seen.clone();
        let flow = GraphBuilder::new().aggregate(agg).sink(move |event| {
            seen_write.lock().unwrap().push(event.body);
        });

        let controller = flow.build(&TideflowConfig::default());

        let mut first = Value::map();
        first.insert("col_a", Value::Int(1));
        first.insert("col_b", Value::Int(2));
        controller.emit(first, Some("k1".into()), Some(0)).await.unwrap();

        // Only col_a changes on this event: col_b's feature keys must not
        // reappear in the emission.
        let mut second = Value::map();
        second.insert("col_a", Value::Int(5));
        controller.emit(second, Some("k1".into()), Some(1_000)).await.unwrap();

        controller.terminate().await.unwrap();
        controller.await_termination().await.unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].get("a_sum_1h").is_some());
        assert!(events[0].get("b_sum_1h").is_some());
        assert!(events[1].get("a_sum_1h").is_some());
        assert!(
            events[1].get("b_sum_1h").is_none(),
            "unchanged column b must be filtered out of the incremental emission"
        );
    }
}
