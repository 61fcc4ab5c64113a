//! Entry point for the polyseek HTTP search server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use core_types::config::load_or_create_config;
use service::{
    RetrieverSearchHandler, index_options, init_tracing_with_config, open_retriever, router, serve,
};

#[derive(Parser, Debug)]
#[command(name = "polyseek-server", version, about = "Cross-lingual search API")]
struct Args {
    /// Config file (defaults to $POLYSEEK_CONFIG or ./polyseek.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address, e.g. 0.0.0.0:8000.
    #[arg(long)]
    bind: Option<String>,
    #[arg(long)]
    index_dir: Option<String>,
    /// `exact` or `accelerated`.
    #[arg(long)]
    backend: Option<String>,
    /// Keep the accelerated index on the CPU.
    #[arg(long)]
    no_gpu: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut cfg = load_or_create_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        cfg.server.bind = bind;
    }
    if let Some(dir) = args.index_dir {
        cfg.paths.index_dir = dir;
    }
    if let Some(backend) = args.backend {
        cfg.index.backend = backend;
    }
    if args.no_gpu {
        cfg.index.use_gpu = false;
    }
    cfg.validate()?;
    let _guard = init_tracing_with_config(&cfg.logging)?;

    // Built before the runtime starts: the HTTP embedder uses a blocking client.
    let retriever = open_retriever(&cfg, &index_options(&cfg)?)?;
    let handler = RetrieverSearchHandler::new(retriever, cfg.retrieval.top_k);
    let app = router(Arc::new(handler), &cfg.server.cors_origins);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
            .await
            .with_context(|| format!("bind {}", cfg.server.bind))?;
        serve(listener, app).await
    })
}
