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

//! The windowed aggregation data model (§4.2–§4.6): raw slots, bucket
//! columns, derived virtual columns, and the per-key store built from them.

pub mod bucket;
pub mod field;
pub mod kind;
pub mod store;
pub mod store_element;
pub mod value;
pub mod virtual_bucket;

pub use bucket::{BucketColumn, LateEventPolicy};
pub use field::{FieldAggregator, FieldExtractor};
pub use kind::{AggKind, RawKind, VirtualKind};
pub use store::AggregateStore;
pub use store_element::StoreElement;
pub use value::AggregationValue;
pub use virtual_bucket::VirtualBucketColumn;
