//! Batch statistics over filter outcomes.

use crate::decision::FilterOutcome;
use crate::email::Email;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const TOP_DOMAINS: usize = 20;
const TOP_REASONS: usize = 15;
const TOP_LABELS: usize = 15;
const DOMAIN_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub name: String,
    pub total_evaluated: u64,
    pub passed: u64,
    pub failed: u64,
    pub reason_counts: BTreeMap<String, u64>,
}

impl FilterStats {
    pub fn pass_rate(&self) -> f64 {
        percent(self.passed, self.total_evaluated)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ScoreSummary {
    fn of(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        Self {
            count: scores.len(),
            min: scores.iter().cloned().fold(f64::INFINITY, f64::min),
            max: scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            avg: scores.iter().sum::<f64>() / scores.len() as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub label: String,
    pub passed: u64,
    pub total: u64,
    pub pass_rate: f64,
}

/// Serializable snapshot of [`FilterAnalytics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_filtered: u64,
    pub passed: u64,
    pub failed: u64,
    pub pass_rate_percent: f64,
    pub filters: Vec<FilterStats>,
    pub all_scores: ScoreSummary,
    pub passed_scores: ScoreSummary,
    pub failed_scores: ScoreSummary,
    pub top_domains: Vec<(String, u64)>,
    pub top_pass_reasons: Vec<(String, u64)>,
    pub top_fail_reasons: Vec<(String, u64)>,
    pub sender_patterns: Vec<(String, u64)>,
    pub labels: Vec<LabelSummary>,
    pub duration_seconds: f64,
    pub insights: Vec<String>,
}

/// Accumulates outcomes of a batch run
#[derive(Debug, Default)]
pub struct FilterAnalytics {
    total: u64,
    passed: u64,
    failed: u64,
    // Keyed by name, kept in first-seen order
    filter_stats: Vec<FilterStats>,
    domain_stats: HashMap<String, DomainStats>,
    sender_patterns: HashMap<String, u64>,
    label_stats: HashMap<String, (u64, u64)>,
    passed_scores: Vec<f64>,
    failed_scores: Vec<f64>,
    pass_reasons: HashMap<String, u64>,
    fail_reasons: HashMap<String, u64>,
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl FilterAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of batch processing
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = None;
    }

    /// Mark the end of batch processing
    pub fn finish(&mut self) {
        if let Some(started) = self.started {
            self.elapsed = Some(started.elapsed());
        }
    }

    /// Zero unless both `start` and `finish` were called
    pub fn processing_duration_seconds(&self) -> f64 {
        self.elapsed.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    pub fn record(&mut self, email: &Email, outcome: &FilterOutcome) {
        self.total += 1;
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }

        for decision in &outcome.decisions {
            let existing = self
                .filter_stats
                .iter()
                .position(|s| s.name == decision.filter_name);
            let idx = match existing {
                Some(idx) => idx,
                None => {
                    self.filter_stats.push(FilterStats {
                        name: decision.filter_name.clone(),
                        ..Default::default()
                    });
                    self.filter_stats.len() - 1
                }
            };
            let stats = &mut self.filter_stats[idx];
            stats.total_evaluated += 1;
            if decision.passed {
                stats.passed += 1;
            } else {
                stats.failed += 1;
            }
            for reason in &decision.reasons {
                *stats.reason_counts.entry(reason_key(reason)).or_default() += 1;
            }

            // Bucketed by the scoring filter's own verdict, not the outcome
            if let Some(score) = decision.score() {
                if decision.passed {
                    self.passed_scores.push(score);
                } else {
                    self.failed_scores.push(score);
                }
            }
        }

        if let Some(domain) = email.sender_domain() {
            let stats = self.domain_stats.entry(domain).or_default();
            stats.total += 1;
            if outcome.passed {
                stats.passed += 1;
            } else {
                stats.failed += 1;
            }
        }

        if let Some(local) = email.sender_local_part() {
            *self
                .sender_patterns
                .entry(sender_pattern(&local).to_string())
                .or_default() += 1;
        }

        for label in &email.labels {
            let entry = self.label_stats.entry(label.clone()).or_default();
            if outcome.passed {
                entry.0 += 1;
            }
            entry.1 += 1;
        }

        let reasons = if outcome.passed {
            &mut self.pass_reasons
        } else {
            &mut self.fail_reasons
        };
        for reason in &outcome.reasons {
            *reasons.entry(reason_key(reason)).or_default() += 1;
        }
    }

    pub fn record_all(&mut self, emails: &[Email], outcomes: &[FilterOutcome]) {
        for (email, outcome) in emails.iter().zip(outcomes) {
            self.record(email, outcome);
        }
    }

    pub fn filter_stats(&self, name: &str) -> Option<&FilterStats> {
        self.filter_stats.iter().find(|s| s.name == name)
    }

    pub fn domain_stats(&self, domain: &str) -> Option<&DomainStats> {
        self.domain_stats.get(domain)
    }

    pub fn summary(&self) -> AnalyticsSummary {
        let all_scores: Vec<f64> = self
            .passed_scores
            .iter()
            .chain(&self.failed_scores)
            .cloned()
            .collect();

        let domain_totals: HashMap<String, u64> = self
            .domain_stats
            .iter()
            .map(|(domain, stats)| (domain.clone(), stats.total))
            .collect();

        let mut labels: Vec<LabelSummary> = self
            .label_stats
            .iter()
            .map(|(label, &(passed, total))| LabelSummary {
                label: label.clone(),
                passed,
                total,
                pass_rate: percent(passed, total),
            })
            .collect();
        labels.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.label.cmp(&b.label)));
        labels.truncate(TOP_LABELS);

        AnalyticsSummary {
            total_filtered: self.total,
            passed: self.passed,
            failed: self.failed,
            pass_rate_percent: percent(self.passed, self.total),
            filters: self.filter_stats.clone(),
            all_scores: ScoreSummary::of(&all_scores),
            passed_scores: ScoreSummary::of(&self.passed_scores),
            failed_scores: ScoreSummary::of(&self.failed_scores),
            top_domains: top_n(&domain_totals, TOP_DOMAINS),
            top_pass_reasons: top_n(&self.pass_reasons, TOP_REASONS),
            top_fail_reasons: top_n(&self.fail_reasons, TOP_REASONS),
            sender_patterns: top_n(&self.sender_patterns, usize::MAX),
            labels,
            duration_seconds: self.processing_duration_seconds(),
            insights: self.insights(),
        }
    }

    /// Tuning hints derived from the recorded batch
    pub fn insights(&self) -> Vec<String> {
        let mut insights = Vec::new();
        if self.total == 0 {
            return insights;
        }

        let pass_rate = percent(self.passed, self.total);
        if pass_rate < 5.0 {
            insights.push(format!(
                "Very low pass rate ({:.1}%); the rules may be too strict",
                pass_rate
            ));
        } else if pass_rate > 50.0 {
            insights.push(format!(
                "High pass rate ({:.1}%); consider tightening the rules to reduce noise",
                pass_rate
            ));
        } else {
            insights.push(format!("Pass rate of {:.1}% is within the normal range", pass_rate));
        }

        if !self.passed_scores.is_empty() && !self.failed_scores.is_empty() {
            let gap = ScoreSummary::of(&self.passed_scores).avg
                - ScoreSummary::of(&self.failed_scores).avg;
            if gap < 2.0 {
                insights.push(format!(
                    "Small gap between passed and rejected average scores ({:.1}); \
                     signal weights may not separate the classes",
                    gap
                ));
            }
        }

        let mut domains: Vec<(&String, &DomainStats)> = self.domain_stats.iter().collect();
        domains.sort_by(|a, b| a.0.cmp(b.0));

        let never_pass: Vec<&str> = domains
            .iter()
            .filter(|(_, stats)| stats.total >= 5 && stats.passed == 0)
            .map(|(domain, _)| domain.as_str())
            .take(DOMAIN_EXAMPLES)
            .collect();
        if !never_pass.is_empty() {
            insights.push(format!(
                "Denylist candidates (5+ emails, none passed): {}",
                never_pass.join(", ")
            ));
        }

        let strong_sources: Vec<&str> = domains
            .iter()
            .filter(|(_, stats)| stats.total >= 3 && percent(stats.passed, stats.total) >= 80.0)
            .map(|(domain, _)| domain.as_str())
            .take(DOMAIN_EXAMPLES)
            .collect();
        if !strong_sources.is_empty() {
            insights.push(format!(
                "High-quality sources (3+ emails, 80%+ passed): {}",
                strong_sources.join(", ")
            ));
        }

        let senders: u64 = self.sender_patterns.values().sum();
        if senders > 0 {
            let count = |name: &str| self.sender_patterns.get(name).copied().unwrap_or(0);
            let recruiting = count("recruiting");
            if recruiting as f64 / senders as f64 > 0.1 {
                insights.push(format!(
                    "{} emails come from recruiting-style addresses; a good signal",
                    recruiting
                ));
            }
            let bulk = percent(count("noreply") + count("marketing"), senders);
            if bulk > 50.0 {
                insights.push(format!(
                    "{:.1}% of emails come from no-reply or marketing addresses",
                    bulk
                ));
            }
        }

        insights
    }

    pub fn render_report(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();

        let _ = writeln!(out, "Filter report");
        let _ = writeln!(out, "=============");
        let _ = writeln!(
            out,
            "Emails: {}  passed: {}  rejected: {}  pass rate: {:.1}%",
            summary.total_filtered, summary.passed, summary.failed, summary.pass_rate_percent
        );

        if !summary.filters.is_empty() {
            let _ = writeln!(out, "\nFilters");
            for stats in &summary.filters {
                let _ = writeln!(
                    out,
                    "  {:<10} evaluated {:>5}  passed {:>5}  rejected {:>5}  ({:.1}%)",
                    stats.name,
                    stats.total_evaluated,
                    stats.passed,
                    stats.failed,
                    stats.pass_rate()
                );
            }
        }

        if summary.all_scores.count > 0 {
            let _ = writeln!(out, "\nKeyword scores");
            for (label, scores) in [
                ("all", &summary.all_scores),
                ("passed", &summary.passed_scores),
                ("rejected", &summary.failed_scores),
            ] {
                let _ = writeln!(
                    out,
                    "  {:<8} n={:<5} min {:>6.1}  max {:>6.1}  avg {:>6.2}",
                    label, scores.count, scores.min, scores.max, scores.avg
                );
            }
        }

        write_counts(&mut out, "Top sender domains", &summary.top_domains);
        write_counts(&mut out, "Top pass reasons", &summary.top_pass_reasons);
        write_counts(&mut out, "Top rejection reasons", &summary.top_fail_reasons);
        write_counts(&mut out, "Sender patterns", &summary.sender_patterns);

        if !summary.labels.is_empty() {
            let _ = writeln!(out, "\nLabels");
            for label in &summary.labels {
                let _ = writeln!(
                    out,
                    "  {:<24} {}/{} passed ({:.1}%)",
                    label.label, label.passed, label.total, label.pass_rate
                );
            }
        }

        if summary.duration_seconds > 0.0 {
            let _ = writeln!(out, "\nProcessed in {:.2}s", summary.duration_seconds);
        }

        let _ = writeln!(out, "\nInsights");
        if summary.insights.is_empty() {
            let _ = writeln!(out, "  No specific recommendations");
        }
        for insight in &summary.insights {
            let _ = writeln!(out, "  - {}", insight);
        }

        out
    }
}

fn write_counts(out: &mut String, title: &str, counts: &[(String, u64)]) {
    if counts.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}", title);
    for (key, count) in counts {
        let _ = writeln!(out, "  {:>5}  {}", count, key);
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn top_n(counts: &HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

/// Collapse per-email detail so reasons aggregate: the score line and the
/// weight suffix vary per email, the signal name does not.
fn reason_key(reason: &str) -> String {
    if reason.starts_with(crate::decision::SCORE_PREFIX) {
        return "score".to_string();
    }
    let base = match reason.rfind(" (") {
        Some(idx) if reason.ends_with(')') => &reason[..idx],
        _ => reason,
    };
    match base.split_once(": ") {
        Some((name, _)) => name.to_string(),
        None => base.to_string(),
    }
}

fn sender_pattern(local_part: &str) -> &'static str {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            ("noreply", r"^(no-?reply|do-?not-?reply)"),
            ("marketing", r"^(marketing|promo|promotions?|campaign)"),
            ("newsletter", r"^(newsletter|news|updates?)"),
            ("notifications", r"^(notification|alert|notify)"),
            ("info", r"^(info|contact|hello|hi)"),
            ("support", r"^(support|help|service)"),
            ("team", r"^team"),
            ("recruiting", r"^(recruit|talent|hiring|careers?|jobs?)"),
            ("billing", r"^(billing|invoice|payment|account)"),
            ("personal", r"^[a-z]+\.[a-z]+"),
        ]
        .into_iter()
        .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
        .collect()
    });

    patterns
        .iter()
        .find(|(_, regex)| regex.is_match(local_part))
        .map(|(name, _)| *name)
        .unwrap_or("other")
}
