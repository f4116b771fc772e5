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

//! Example binary wiring the engine's crates into two runnable demo
//! pipelines. Not a production entry point: the config/CLI surface beyond
//! this is deliberately out of scope (§1, Non-goals).

mod demo;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tideflow_common::TideflowConfig;

#[derive(Parser)]
#[command(name = "tideflow", version, about = "Tideflow dataflow engine demos")]
struct Cli {
    /// Path to a TOML config file. Missing keys fall back to defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Numeric pipeline: map, filter, fan-out into two summing reducers.
    Demo {
        #[arg(long, default_value_t = 10)]
        count: i64,
    },
    /// Windowed aggregation over synthetic price events.
    Aggregate {
        #[arg(long, default_value_t = 50)]
        events: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Demo { count } => demo::run_numeric_demo(&config, count).await,
        Command::Aggregate { events } => demo::run_aggregate_demo(&config, events).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<TideflowConfig> {
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)?;
            Ok(TideflowConfig::from_toml_str(&raw)?)
        }
        None => Ok(TideflowConfig::default()),
    }
}
