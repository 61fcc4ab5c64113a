use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use cli::{REPL_HELP, ReplCommand, gpu_override, parse_repl_line, render_results, render_status};
use console::style;
use core_serialization::{DESCRIPTOR_FILE, read_descriptor};
use core_types::config::{AppConfig, load_or_create_config};
use evaluation::{EvalConfig, Evaluator, render_table};
use indicatif::{ProgressBar, ProgressStyle};
use retrieval::{Retriever, SearchOptions};
use service::bootstrap::{BuildOptions, BuildOutcome, build_index, dataset_source, open_store};
use service::{index_options, init_tracing_with_config, open_retriever};

/// Cross-lingual dense retrieval: build, search and evaluate.
#[derive(Parser, Debug)]
#[command(name = "polyseek", version, about = "Cross-lingual semantic search")]
struct Cli {
    /// Config file (defaults to $POLYSEEK_CONFIG or ./polyseek.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Index directory override.
    #[arg(long, global = true)]
    index_dir: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct BackendArgs {
    /// `exact` or `accelerated`.
    #[arg(long)]
    backend: Option<String>,
    /// Place the accelerated index on a GPU when one is available.
    #[arg(long, conflicts_with = "no_gpu")]
    gpu: bool,
    #[arg(long)]
    no_gpu: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode the corpus and write the index.
    Build {
        /// Languages to index (names or codes).
        #[arg(long, num_args = 1..)]
        languages: Vec<String>,
        /// Documents to sample from the combined corpus.
        #[arg(long, conflicts_with = "full_corpus")]
        sample_size: Option<usize>,
        /// Index every document instead of a sample.
        #[arg(long)]
        full_corpus: bool,
        #[arg(long)]
        seed: Option<u64>,
        /// Rebuild even if an index already exists.
        #[arg(long)]
        force_rebuild: bool,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Run one query.
    Search {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Print document text under each hit.
        #[arg(long)]
        show_text: bool,
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Query in a loop until `quit`.
    Interactive {
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Score the index with nDCG@10 and Recall@100.
    Evaluate {
        #[arg(long, num_args = 1..)]
        languages: Vec<String>,
        #[arg(long)]
        split: Option<String>,
        /// Cap on queries per language.
        #[arg(long)]
        max_queries: Option<usize>,
        /// Emit the full report as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Show the stored index descriptor and backend notices.
    Info {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut cfg = load_or_create_config(cli.config.as_deref())?;
    if let Some(dir) = cli.index_dir {
        cfg.paths.index_dir = dir;
    }
    let _guard = init_tracing_with_config(&cfg.logging)?;

    match cli.command {
        Commands::Build {
            languages,
            sample_size,
            full_corpus,
            seed,
            force_rebuild,
            backend,
        } => {
            apply_backend(&mut cfg, &backend);
            if !languages.is_empty() {
                cfg.index.languages = languages;
            }
            if full_corpus {
                cfg.index.corpus_sample_size = None;
            } else if sample_size.is_some() {
                cfg.index.corpus_sample_size = sample_size;
            }
            if let Some(seed) = seed {
                cfg.index.sample_seed = seed;
            }
            cfg.validate()?;
            run_build(&cfg, force_rebuild)
        }
        Commands::Search {
            query,
            top_k,
            show_text,
            json,
            backend,
        } => {
            apply_backend(&mut cfg, &backend);
            if let Some(k) = top_k {
                cfg.retrieval.top_k = k;
            }
            cfg.validate()?;
            run_search(&cfg, &query, show_text, json)
        }
        Commands::Interactive { top_k, backend } => {
            apply_backend(&mut cfg, &backend);
            if let Some(k) = top_k {
                cfg.retrieval.top_k = k;
            }
            cfg.validate()?;
            run_interactive(&cfg)
        }
        Commands::Evaluate {
            languages,
            split,
            max_queries,
            json,
            backend,
        } => {
            apply_backend(&mut cfg, &backend);
            if !languages.is_empty() {
                cfg.evaluation.languages = languages;
            }
            if let Some(split) = split {
                cfg.evaluation.split = split;
            }
            if max_queries.is_some() {
                cfg.evaluation.max_queries = max_queries;
            }
            cfg.validate()?;
            run_evaluate(&cfg, json)
        }
        Commands::Info { json } => run_info(&cfg, json),
    }
}

fn apply_backend(cfg: &mut AppConfig, args: &BackendArgs) {
    if let Some(backend) = &args.backend {
        cfg.index.backend = backend.clone();
    }
    if let Some(use_gpu) = gpu_override(args.gpu, args.no_gpu) {
        cfg.index.use_gpu = use_gpu;
    }
}

/// Totals are unknown up front (sampling, skipped subsets), so count upwards.
fn progress_counter(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let template = format!("{{spinner:.cyan}} {label} {{pos}} ({{per_sec}}, {{elapsed}})");
    if let Ok(style) = ProgressStyle::with_template(&template) {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn run_build(cfg: &AppConfig, force: bool) -> Result<()> {
    let options = BuildOptions {
        force,
        ..BuildOptions::from_config(cfg)?
    };
    let embedder = embedder::from_config(&cfg.embedder).context("construct embedding provider")?;
    let source = dataset_source(cfg);
    let bar = progress_counter("documents encoded");
    let outcome = build_index(embedder.as_ref(), &source, &cfg.index_dir(), &options, &|n| {
        bar.inc(n as u64);
    });
    bar.finish_and_clear();

    match outcome? {
        BuildOutcome::AlreadyPresent => {
            println!(
                "{} Index already exists at {}. Use --force-rebuild to rebuild.",
                style("!").yellow(),
                cfg.index_dir().display()
            );
        }
        BuildOutcome::Built(store) => {
            println!(
                "{} Indexed {} documents ({} backend) into {}",
                style("✓").green(),
                store.len(),
                store.backend(),
                cfg.index_dir().display()
            );
            print!("{}", render_status(&store.status()));
        }
    }
    Ok(())
}

fn run_search(cfg: &AppConfig, query: &str, show_text: bool, json: bool) -> Result<()> {
    let retriever = open_retriever(cfg, &index_options(cfg)?)?;
    let results = retriever.search_with(query, cfg.retrieval.top_k, &SearchOptions::default())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{} {query}", style("Query:").bold());
        print!("{}", render_results(&results, show_text, cfg.retrieval.max_text_chars));
    }
    Ok(())
}

fn run_interactive(cfg: &AppConfig) -> Result<()> {
    let retriever = open_retriever(cfg, &index_options(cfg)?)?;
    print_banner(&retriever);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n{} ", style("query>").bold().cyan());
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        match parse_repl_line(&line?) {
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{REPL_HELP}"),
            ReplCommand::Empty => {}
            ReplCommand::Query(query) => {
                let options = SearchOptions::default();
                match retriever.search_with(&query, cfg.retrieval.top_k, &options) {
                    Ok(results) => {
                        print!("{}", render_results(&results, true, cfg.retrieval.max_text_chars));
                    }
                    Err(err) => eprintln!("{} {err}", style("error:").red()),
                }
            }
        }
    }
    println!("Goodbye!");
    Ok(())
}

fn print_banner(retriever: &Retriever) {
    let status = retriever.store().status();
    let languages: Vec<&str> = status.languages.keys().map(|l| l.display_name()).collect();
    println!("{}", "=".repeat(80));
    println!("{}", style("polyseek interactive search").bold());
    println!(
        "Indexed {} documents in {} languages: {}",
        status.document_count,
        languages.len(),
        languages.join(", ")
    );
    println!("Commands: `quit` or `exit` to leave, `help` for help");
    println!("{}", "=".repeat(80));
}

fn run_evaluate(cfg: &AppConfig, json: bool) -> Result<()> {
    let languages = AppConfig::parse_languages(&cfg.evaluation.languages)?;
    if languages.is_empty() {
        bail!("no evaluation languages configured");
    }
    let retriever = open_retriever(cfg, &index_options(cfg)?)?;
    let evaluator = Evaluator::new(
        retriever,
        EvalConfig {
            ndcg_k: cfg.evaluation.ndcg_k,
            recall_k: cfg.evaluation.recall_k,
            max_queries: cfg.evaluation.max_queries,
        },
    )?;
    let source = dataset_source(cfg);

    let bar = progress_counter("queries scored");
    let report = evaluator.evaluate(&source, &languages, &cfg.evaluation.split, &|n| {
        bar.inc(n as u64);
    });
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} split `{}`", style("Evaluation").bold(), report.split);
        print!("{}", render_table(&report));
    }
    Ok(())
}

fn run_info(cfg: &AppConfig, json: bool) -> Result<()> {
    let dir = cfg.index_dir();
    let descriptor_path = dir.join(DESCRIPTOR_FILE);
    let descriptor = if descriptor_path.is_file() {
        Some(read_descriptor(&descriptor_path).context("read index descriptor")?)
    } else {
        None
    };
    let store = open_store(cfg, &index_options(cfg)?)?;
    let status = store.status();

    if json {
        let value = serde_json::json!({
            "index_dir": dir,
            "descriptor": descriptor,
            "status": status,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{} {}", style("Index").bold(), dir.display());
    match &descriptor {
        Some(d) => println!(
            "schema v{} | built with {} | {} docs x {} dims | gpu {} | created {}",
            d.schema_version,
            d.backend,
            d.document_count,
            d.dimension,
            d.gpu_enabled,
            d.created_at
        ),
        None => println!("{}", style("descriptor missing").yellow()),
    }
    print!("{}", render_status(&status));
    Ok(())
}
