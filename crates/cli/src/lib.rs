//! Rendering and input helpers shared by the `polyseek` binary.

use std::fmt::Write as _;

use console::style;
use core_types::SearchResult;
use retrieval::truncate_chars;
use semantic_index::StoreStatus;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    Empty,
    Query(String),
}

pub fn parse_repl_line(line: &str) -> ReplCommand {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => ReplCommand::Empty,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        "help" | "?" => ReplCommand::Help,
        _ => ReplCommand::Query(line.to_string()),
    }
}

pub const REPL_HELP: &str = "\
  Enter a query in English or any indexed language.
  Results are ranked across every language in the index.
  Type `quit` or `exit` to leave.";

/// `--gpu` / `--no-gpu` to an optional override of `index.use_gpu`.
pub fn gpu_override(gpu: bool, no_gpu: bool) -> Option<bool> {
    match (gpu, no_gpu) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Ranked results as printed by `search` and `interactive`.
pub fn render_results(results: &[SearchResult], show_text: bool, max_chars: usize) -> String {
    let mut out = String::new();
    if results.is_empty() {
        let _ = writeln!(out, "{}", style("No results.").yellow());
        return out;
    }
    let rule = "-".repeat(80);
    for result in results {
        let _ = writeln!(
            out,
            "[{}] {} | score {:.4}",
            style(result.rank).bold(),
            style(result.language.display_name()).cyan(),
            result.score
        );
        let _ = writeln!(out, "doc: {}", result.doc_id);
        if show_text {
            let snippet = truncate_chars(&result.text.replace('\n', " "), max_chars);
            let cut = snippet.chars().count() < result.text.chars().count();
            let ellipsis = if cut { "..." } else { "" };
            let _ = writeln!(out, "{}{ellipsis}", snippet.trim());
        }
        let _ = writeln!(out, "{rule}");
    }
    out
}

/// Human summary of a loaded store, notices last.
pub fn render_status(status: &StoreStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "documents : {}", status.document_count);
    let _ = writeln!(out, "dimension : {}", status.dimension);
    let _ = writeln!(
        out,
        "backend   : {} (requested {})",
        status.backend, status.requested_backend
    );
    let _ = writeln!(out, "engine    : {}", status.engine.as_deref().unwrap_or("-"));
    let _ = writeln!(
        out,
        "placement : {} (gpu requested: {})",
        status.placement, status.gpu_requested
    );
    let _ = writeln!(out, "model     : {}", status.model.as_deref().unwrap_or("unknown"));
    for (language, count) in &status.languages {
        let _ = writeln!(out, "  {:<10} {count}", language.display_name());
    }
    for notice in &status.notices {
        let _ = writeln!(out, "{} {notice}", style("notice:").yellow());
    }
    out
}
