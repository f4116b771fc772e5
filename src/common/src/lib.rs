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

//! Shared primitives for the Tideflow streaming aggregation engine:
//! the dynamically typed [`Value`], human duration parsing, window
//! specifications, configuration, and the crate-wide construction-time
//! error type.

pub mod config;
pub mod duration;
pub mod error;
pub mod value;
pub mod window;

pub use config::TideflowConfig;
pub use error::{Error, Result};
pub use value::Value;
pub use window::{WindowKind, WindowSpec};
