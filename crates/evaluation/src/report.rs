use std::fmt::Write as _;

use core_types::Language;
use indexmap::IndexMap;
use serde::Serialize;

use crate::metrics::mean;

/// Mean metrics plus the counters that make them auditable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub ndcg: f64,
    pub recall: f64,
    /// Queries included in the means.
    pub evaluated: usize,
    /// Queries without any relevant judgment.
    pub excluded: usize,
    /// Queries that could not be encoded or searched.
    pub failed: usize,
    /// Relevant judgments whose document is not in the index.
    pub missing_judgments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub query_id: String,
    pub ndcg: f64,
    pub recall: f64,
    pub relevant: usize,
    pub missing_judgments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubsetReport {
    pub language: Language,
    pub total_queries: usize,
    pub summary: Aggregate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryOutcome>,
}

impl SubsetReport {
    pub fn new(language: Language, total_queries: usize) -> Self {
        Self {
            language,
            total_queries,
            summary: Aggregate::default(),
            queries: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: QueryOutcome) {
        self.summary.evaluated += 1;
        self.summary.missing_judgments += outcome.missing_judgments;
        self.queries.push(outcome);
    }

    pub fn finish(&mut self) {
        let (ndcg, recall) = means(&self.queries);
        self.summary.ndcg = ndcg;
        self.summary.recall = recall;
    }
}

fn means<'a>(outcomes: impl IntoIterator<Item = &'a QueryOutcome> + Clone) -> (f64, f64) {
    let ndcg: Vec<f64> = outcomes.clone().into_iter().map(|o| o.ndcg).collect();
    let recall: Vec<f64> = outcomes.into_iter().map(|o| o.recall).collect();
    (mean(&ndcg), mean(&recall))
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub split: String,
    pub ndcg_k: usize,
    pub recall_k: usize,
    /// Keyed by language display name, in evaluation order.
    pub subsets: IndexMap<String, SubsetReport>,
    /// Subsets that could not be evaluated, with the reason.
    pub skipped: IndexMap<String, String>,
    /// Means pooled over every evaluated query of every subset.
    pub overall: Aggregate,
}

impl EvaluationReport {
    pub fn new(split: &str, ndcg_k: usize, recall_k: usize) -> Self {
        Self {
            split: split.to_string(),
            ndcg_k,
            recall_k,
            subsets: IndexMap::new(),
            skipped: IndexMap::new(),
            overall: Aggregate::default(),
        }
    }

    pub fn push_subset(&mut self, subset: SubsetReport) {
        self.subsets
            .insert(subset.language.display_name().to_string(), subset);
    }

    pub fn push_skipped(&mut self, name: &str, reason: String) {
        self.skipped.insert(name.to_string(), reason);
    }

    pub fn finish(&mut self) {
        let all = self.subsets.values().flat_map(|s| s.queries.iter());
        let (ndcg, recall) = means(all);
        let mut overall = Aggregate {
            ndcg,
            recall,
            ..Aggregate::default()
        };
        for subset in self.subsets.values() {
            overall.evaluated += subset.summary.evaluated;
            overall.excluded += subset.summary.excluded;
            overall.failed += subset.summary.failed;
            overall.missing_judgments += subset.summary.missing_judgments;
        }
        self.overall = overall;
    }
}

/// Fixed-width summary table, one row per subset plus the pooled overall row.
pub fn render_table(report: &EvaluationReport) -> String {
    let ndcg = format!("nDCG@{}", report.ndcg_k);
    let recall = format!("Recall@{}", report.recall_k);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>10} {:>9} {:>9} {:>7} {:>8}",
        "Subset", ndcg, recall, "Queries", "Excluded", "Failed", "Missing"
    );
    let _ = writeln!(out, "{}", "-".repeat(71));
    let rows = report
        .subsets
        .iter()
        .map(|(name, s)| (name.as_str(), &s.summary))
        .chain(std::iter::once(("Overall", &report.overall)));
    for (name, agg) in rows {
        let _ = writeln!(
            out,
            "{:<12} {:>10.4} {:>10.4} {:>9} {:>9} {:>7} {:>8}",
            name,
            agg.ndcg,
            agg.recall,
            agg.evaluated,
            agg.excluded,
            agg.failed,
            agg.missing_judgments
        );
    }
    for (name, reason) in &report.skipped {
        let _ = writeln!(out, "{name:<12} skipped: {reason}");
    }
    out
}
