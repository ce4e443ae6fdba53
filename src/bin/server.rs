/*
 * Copyright 2025 ClipSeek
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! ClipSeek Server - semantic transcript search over HTTP

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clipseek::{Clipseek, Config};

#[derive(Parser)]
#[command(name = "clipseek-server")]
#[command(about = "ClipSeek semantic transcript search server")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Override the JSONL corpus consumed by rebuilds
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Rebuild the index from the corpus before serving
    #[arg(long)]
    rebuild: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("clipseek=info,tower_http=warn")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = if args.config.exists() {
        let config_str = std::fs::read_to_string(&args.config)?;
        toml::from_str::<Config>(&config_str)?
    } else {
        info!("configuration file not found, using defaults");
        Config::default()
    };

    // Override with CLI arguments
    if let Some(data_dir) = args.data_dir {
        config.storage.index_dir = data_dir.join("index");
        config.storage.corpus_path = data_dir.join("corpus.jsonl");
        config.storage.data_dir = data_dir;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(corpus) = args.corpus {
        config.storage.corpus_path = corpus;
    }

    info!("🚀 starting clipseek server");
    let app = Clipseek::new(config)?;

    // Bring up the last committed snapshot, or build one if a corpus
    // is available.
    match app.load_persisted() {
        Ok(true) => info!("loaded persisted index snapshot"),
        Ok(false) => info!("no persisted snapshot found"),
        Err(e) => warn!(error = %e, "persisted snapshot unreadable, starting without it"),
    }

    let need_initial_build = args.rebuild
        || (app.snapshots().current().is_none() && app.config().storage.corpus_path.exists());
    if need_initial_build {
        info!(
            corpus = %app.config().storage.corpus_path.display(),
            "building index from corpus"
        );
        match app.rebuild_from_corpus().await {
            Ok(report) => info!(
                version = report.snapshot_version,
                indexed = report.indexed,
                skipped = report.skipped.len(),
                "initial build complete"
            ),
            Err(e) => error!(error = %e, "initial build failed, serving without an index"),
        }
    }

    let server = app.rest_server()?;
    server
        .start(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal, stopping server");
        })
        .await?;

    info!("clipseek server stopped");
    Ok(())
}
