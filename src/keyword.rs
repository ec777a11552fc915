//! Rule-based job-opportunity scorer.
//!
//! Scoring runs in three phases:
//!
//! 1. Denylisted sender domains fail immediately.
//! 2. Education/admissions language fails immediately unless a strong job
//!    signal is also present.
//! 3. Every other email is scored as a sum of weighted signals and passes
//!    when the sum reaches [`ScoreWeights::pass_threshold`].
//!
//! The reason list of a scored decision names every contributing signal and
//! ends with `score: <value> (threshold: <threshold>)`.

use crate::decision::{FilterDecision, SCORE_PREFIX};
use crate::domain_utils::DomainUtils;
use crate::email::Email;
use crate::filter::EmailFilter;
use crate::rules::{CompiledRules, RuleSet};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const FILTER_NAME: &str = "keyword";

const MAX_LISTED_KEYWORDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub pass_threshold: f64,
    pub strong_signal: f64,
    pub job_board: f64,
    pub role_title: f64,
    pub strong_keyword: f64,
    pub strong_keyword_cap: f64,
    pub weak_keyword: f64,
    pub weak_keyword_cap: f64,
    /// Distinct weak keywords needed before any of them count
    pub weak_keyword_min_hits: usize,
    pub promo_sender_penalty: f64,
    pub commercial_subdomain_penalty: f64,
    pub promo_content_penalty: f64,
    pub transactional_penalty: f64,
    pub marketing_footer_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            pass_threshold: 3.0,
            strong_signal: 4.0,
            job_board: 5.0,
            role_title: 2.0,
            strong_keyword: 2.0,
            strong_keyword_cap: 4.0,
            weak_keyword: 0.5,
            weak_keyword_cap: 2.0,
            weak_keyword_min_hits: 3,
            promo_sender_penalty: -3.0,
            commercial_subdomain_penalty: -2.0,
            promo_content_penalty: -2.0,
            transactional_penalty: -3.0,
            marketing_footer_penalty: -1.0,
        }
    }
}

/// One contribution to the score
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub reason: String,
    pub weight: f64,
}

impl Signal {
    fn new(reason: impl Into<String>, weight: f64) -> Self {
        Self {
            reason: reason.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    /// Failed before scoring
    Blocked { reason: String },
    Scored { score: f64, signals: Vec<Signal> },
}

fn oa_token() -> &'static Regex {
    static OA: OnceLock<Regex> = OnceLock::new();
    OA.get_or_init(|| Regex::new(r"(?i)\boa\b").unwrap())
}

pub struct KeywordFilter {
    rules: CompiledRules,
    weights: ScoreWeights,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(&RuleSet::default()).expect("built-in rule set compiles")
    }
}

impl KeywordFilter {
    pub fn new(rules: &RuleSet) -> Result<Self> {
        Self::with_weights(rules, ScoreWeights::default())
    }

    pub fn with_weights(rules: &RuleSet, weights: ScoreWeights) -> Result<Self> {
        Ok(Self::from_compiled(rules.compile()?, weights))
    }

    pub fn from_compiled(rules: CompiledRules, weights: ScoreWeights) -> Self {
        Self { rules, weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Run the scoring phases without building a decision
    pub fn assess(&self, email: &Email) -> Assessment {
        let text = email.combined_text();
        let domain = email.sender_domain();
        let local_part = email.sender_local_part();

        if let Some(domain) = &domain {
            if DomainUtils::matches_exact(domain, &self.rules.non_job_domains) {
                return Assessment::Blocked {
                    reason: format!("non-job domain denylist: {}", domain),
                };
            }
        }

        let strong_signal = self.rules.strong_signals.is_match(&text);
        if !strong_signal && self.rules.education.is_match(&text) {
            return Assessment::Blocked {
                reason: "education/admissions pattern".to_string(),
            };
        }

        let signals = self.collect_signals(
            &text,
            domain.as_deref(),
            local_part.as_deref(),
            strong_signal,
        );
        let score: f64 = signals.iter().map(|s| s.weight).sum();
        Assessment::Scored { score, signals }
    }

    fn collect_signals(
        &self,
        text: &str,
        domain: Option<&str>,
        local_part: Option<&str>,
        strong_signal: bool,
    ) -> Vec<Signal> {
        let w = &self.weights;
        let mut signals = Vec::new();

        let job_board = domain
            .filter(|d| DomainUtils::matches_domain_list(d, &self.rules.job_source_domains));
        if let Some(domain) = job_board {
            signals.push(Signal::new(format!("job source domain: {}", domain), w.job_board));
        }

        if strong_signal {
            signals.push(Signal::new("strong job signal", w.strong_signal));
        }

        if self.rules.role_titles.is_match(text) {
            signals.push(Signal::new("role/title mentioned", w.role_title));
        }

        let keywords = self.strong_keyword_hits(text);
        if !keywords.is_empty() {
            let weight = (keywords.len() as f64 * w.strong_keyword).min(w.strong_keyword_cap);
            signals.push(Signal::new(
                format!("keyword hits: {}", list_keywords(&keywords)),
                weight,
            ));
        }

        // Generic words only count when nothing stronger fired
        if !strong_signal && keywords.is_empty() {
            let weak = self.weak_keyword_hits(text);
            if weak.len() >= w.weak_keyword_min_hits {
                let weight = (weak.len() as f64 * w.weak_keyword).min(w.weak_keyword_cap);
                signals.push(Signal::new(
                    format!("weak keyword hits: {}", list_keywords(&weak)),
                    weight,
                ));
            }
        }

        // Job boards commonly send from no-reply addresses
        if job_board.is_none() {
            if let Some(local) = local_part {
                if self.rules.promo_senders.is_match(local) {
                    signals.push(Signal::new(
                        format!("promotional sender: {}", local),
                        w.promo_sender_penalty,
                    ));
                }
            }
            if let Some(domain) = domain {
                if self.rules.commercial_subdomains.is_match(domain) {
                    signals.push(Signal::new(
                        format!("commercial subdomain: {}", domain),
                        w.commercial_subdomain_penalty,
                    ));
                }
            }
        }

        if self.rules.promo_content.is_match(text) {
            signals.push(Signal::new("promotional content", w.promo_content_penalty));
        }
        if self.rules.transactional.is_match(text) {
            signals.push(Signal::new("transactional content", w.transactional_penalty));
        }
        if self.rules.marketing_footer.is_match(text) {
            signals.push(Signal::new("marketing footer", w.marketing_footer_penalty));
        }

        signals
    }

    fn strong_keyword_hits(&self, text: &str) -> BTreeSet<String> {
        let mut hits: BTreeSet<String> = self
            .rules
            .job_keywords
            .iter()
            .filter(|kw| !kw.is_empty() && text.contains(kw.as_str()))
            .cloned()
            .collect();

        if text.contains("schedule") && self.rules.interview_context.is_match(text) {
            hits.insert("schedule(interview-context)".to_string());
        }
        if oa_token().is_match(text) && self.rules.assessment_context.is_match(text) {
            hits.insert("oa(assessment-context)".to_string());
        }

        hits
    }

    fn weak_keyword_hits(&self, text: &str) -> BTreeSet<String> {
        self.rules
            .weak_keywords
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(kw, _)| kw.clone())
            .collect()
    }

    fn decide(&self, assessment: Assessment) -> FilterDecision {
        let (score, signals) = match assessment {
            Assessment::Blocked { reason } => {
                return FilterDecision::fail(FILTER_NAME, vec![reason]);
            }
            Assessment::Scored { score, signals } => (score, signals),
        };

        let threshold = self.weights.pass_threshold;
        let passed = score >= threshold;

        let mut reasons = Vec::with_capacity(signals.len() + 2);
        if !passed {
            let any_positive = signals.iter().any(|s| s.weight > 0.0);
            reasons.push(if any_positive {
                "insufficient job signals".to_string()
            } else {
                "no positive job signals".to_string()
            });
        }
        reasons.extend(
            signals
                .iter()
                .map(|s| format!("{} ({:+.1})", s.reason, s.weight)),
        );
        reasons.push(format!(
            "{}{:.1} (threshold: {:.1})",
            SCORE_PREFIX, score, threshold
        ));

        FilterDecision::new(FILTER_NAME, passed, reasons)
    }
}

fn list_keywords(keywords: &BTreeSet<String>) -> String {
    let listed: Vec<&str> = keywords
        .iter()
        .take(MAX_LISTED_KEYWORDS)
        .map(|s| s.as_str())
        .collect();
    let mut joined = listed.join(", ");
    if keywords.len() > MAX_LISTED_KEYWORDS {
        joined.push_str("...");
    }
    joined
}

impl EmailFilter for KeywordFilter {
    fn name(&self) -> &str {
        FILTER_NAME
    }

    fn evaluate(&self, email: &Email) -> FilterDecision {
        let decision = self.decide(self.assess(email));
        log::debug!(
            "keyword filter {} '{}': {}",
            if decision.passed { "passed" } else { "rejected" },
            email.subject,
            decision.reasons.join("; ")
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn email(from: &str, subject: &str, body: &str) -> Email {
        Email::new(from, subject, body)
    }

    fn score_of(filter: &KeywordFilter, email: &Email) -> f64 {
        match filter.assess(email) {
            Assessment::Scored { score, .. } => score,
            Assessment::Blocked { reason } => panic!("unexpectedly blocked: {}", reason),
        }
    }

    fn has_signal(filter: &KeywordFilter, email: &Email, prefix: &str) -> bool {
        match filter.assess(email) {
            Assessment::Scored { signals, .. } => {
                signals.iter().any(|s| s.reason.starts_with(prefix))
            }
            Assessment::Blocked { .. } => false,
        }
    }

    #[test]
    fn test_job_board_interview_invite_passes() {
        let filter = KeywordFilter::default();
        let msg = email("jobs@greenhouse.io", "Senior Engineer - Interview invite", "");

        let decision = filter.evaluate(&msg);

        assert!(decision.passed);
        assert_eq!(decision.filter_name, "keyword");
        assert!(decision.reasons[0].starts_with("job source domain: greenhouse.io (+5.0)"));
        assert!(decision.reasons.iter().any(|r| r == "strong job signal (+4.0)"));
        assert!(score_of(&filter, &msg) >= 9.0);
        assert!(decision
            .reasons
            .last()
            .unwrap()
            .ends_with("(threshold: 3.0)"));
    }

    #[test]
    fn test_promotional_mail_fails_without_positive_signals() {
        let filter = KeywordFilter::default();
        let msg = email(
            "noreply@shop.example.com",
            "",
            "Flash sale! 50% off, unsubscribe here",
        );

        let decision = filter.evaluate(&msg);

        assert!(!decision.passed);
        assert_eq!(decision.reasons[0], "no positive job signals");
        assert!(decision
            .reasons
            .iter()
            .any(|r| r == "promotional sender: noreply (-3.0)"));
        assert!(decision.reasons.iter().any(|r| r == "promotional content (-2.0)"));
        assert!(score_of(&filter, &msg) <= -5.0);
        assert!(decision.reasons.last().unwrap().starts_with("score: "));
    }

    #[test]
    fn test_admissions_mail_is_blocked() {
        let filter = KeywordFilter::default();
        let msg = email(
            "admissions@university.edu",
            "",
            "Apply now for our online Master's program",
        );

        let decision = filter.evaluate(&msg);

        assert!(!decision.passed);
        assert_eq!(decision.reasons, vec!["education/admissions pattern".to_string()]);
    }

    #[test]
    fn test_education_blocks_regardless_of_score() {
        let filter = KeywordFilter::default();
        let body = "Here is my calendar link.";
        let plain = email("jobs@greenhouse.io", "Senior developer quick chat", body);
        assert!(filter.evaluate(&plain).passed);
        assert!(score_of(&filter, &plain) >= 7.0);

        let msg = email(
            "jobs@greenhouse.io",
            "Senior developer quick chat",
            "Here is my calendar link. I studied at the university.",
        );

        let decision = filter.evaluate(&msg);

        assert!(!decision.passed);
        assert_eq!(decision.reasons, vec!["education/admissions pattern".to_string()]);
    }

    #[test]
    fn test_strong_signal_overrides_education() {
        let filter = KeywordFilter::default();
        let msg = email(
            "careers@university.edu",
            "Careers at the University",
            "We would like to schedule an interview for the analyst position.",
        );

        let decision = filter.evaluate(&msg);

        assert!(decision.passed);
        assert!(decision.reasons.iter().any(|r| r == "strong job signal (+4.0)"));
    }

    #[test]
    fn test_denylisted_domain_is_blocked_before_scoring() {
        let filter = KeywordFilter::default();
        let msg = email(
            "Meetup <info@email.meetup.com>",
            "Recruiter interview tips",
            "Interview with a recruiter",
        );

        let decision = filter.evaluate(&msg);

        assert!(!decision.passed);
        assert_eq!(
            decision.reasons,
            vec!["non-job domain denylist: email.meetup.com".to_string()]
        );
    }

    #[test]
    fn test_denylist_is_exact_match() {
        let filter = KeywordFilter::default();
        let msg = email("info@meetup.com", "", "hello");

        assert!(matches!(filter.assess(&msg), Assessment::Scored { .. }));
    }

    #[test]
    fn test_job_board_no_reply_is_not_penalized() {
        let filter = KeywordFilter::default();
        let msg = email("no-reply@us.greenhouse.io", "Thanks", "unrelated words");

        assert!(!has_signal(&filter, &msg, "promotional sender"));
        assert!(has_signal(&filter, &msg, "job source domain: us.greenhouse.io"));

        let other = email("no-reply@example.com", "Thanks", "unrelated words");
        assert!(has_signal(&filter, &other, "promotional sender: no-reply"));
    }

    #[test]
    fn test_commercial_subdomain_penalty() {
        let filter = KeywordFilter::default();

        let msg = email("hello@news.example.com", "Hi", "words");
        assert!(has_signal(&filter, &msg, "commercial subdomain: news.example.com"));

        // Two-label provider domains are not subdomains
        let provider = email("someone@mail.com", "Hi", "words");
        assert!(!has_signal(&filter, &provider, "commercial subdomain"));

        let board = email("alerts@email.linkedin.com", "Hi", "words");
        assert!(!has_signal(&filter, &board, "commercial subdomain"));
    }

    #[test]
    fn test_weak_keyword_gate() {
        let filter = KeywordFilter::default();

        let two = email("someone@example.com", "", "A great opportunity for the team.");
        assert_eq!(score_of(&filter, &two), 0.0);

        let three = email(
            "someone@example.com",
            "",
            "A great opportunity for the team, fully remote.",
        );
        assert_eq!(score_of(&filter, &three), 1.5);

        let five = email(
            "someone@example.com",
            "",
            "Opportunity on a remote team with a salary and a bonus.",
        );
        assert_eq!(score_of(&filter, &five), 2.0);
    }

    #[test]
    fn test_weak_keywords_ignored_when_strong_keyword_fires() {
        let filter = KeywordFilter::default();
        let msg = email(
            "someone@example.com",
            "",
            "Quick chat about an opportunity on a remote team?",
        );

        assert!(has_signal(&filter, &msg, "keyword hits: quick chat"));
        assert!(!has_signal(&filter, &msg, "weak keyword hits"));
    }

    #[test]
    fn test_strong_keyword_cap() {
        let filter = KeywordFilter::default();
        let msg = email(
            "someone@example.com",
            "",
            "quick chat? calendar link below, are you open to it, cover letter optional",
        );

        let decision = filter.evaluate(&msg);
        let keyword_reason = decision
            .reasons
            .iter()
            .find(|r| r.starts_with("keyword hits"))
            .unwrap();
        assert!(keyword_reason.ends_with("(+4.0)"));
    }

    #[test]
    fn test_schedule_requires_interview_context() {
        let filter = KeywordFilter::default();

        let plain = email("someone@example.com", "", "Please schedule your dentist visit");
        assert!(!has_signal(&filter, &plain, "keyword hits"));

        let gated = email(
            "someone@example.com",
            "",
            "Please schedule time with our recruiting team",
        );
        let decision = filter.evaluate(&gated);
        assert!(decision
            .reasons
            .iter()
            .any(|r| r.contains("schedule(interview-context)")));
    }

    #[test]
    fn test_oa_requires_assessment_context() {
        let filter = KeywordFilter::default();

        let plain = email("someone@example.com", "", "The OA meeting moved to Friday");
        assert!(!has_signal(&filter, &plain, "keyword hits"));

        let gated = email(
            "someone@example.com",
            "",
            "Your OA link: complete the HackerRank assessment within 7 days",
        );
        let decision = filter.evaluate(&gated);
        assert!(decision
            .reasons
            .iter()
            .any(|r| r.contains("oa(assessment-context)")));
    }

    #[test]
    fn test_insufficient_signals_prefix() {
        let filter = KeywordFilter::default();
        let msg = email(
            "deals@example.com",
            "Senior picks",
            "Shop now for our senior discount",
        );

        let decision = filter.evaluate(&msg);

        assert!(!decision.passed);
        assert_eq!(decision.reasons[0], "insufficient job signals");
        assert!(decision.reasons.iter().any(|r| r == "role/title mentioned (+2.0)"));
    }

    #[test]
    fn test_penalties_stack() {
        let filter = KeywordFilter::default();
        let msg = email(
            "someone@example.com",
            "Order confirmation",
            "Use promo code SAVE. Your receipt is attached. Unsubscribe anytime.",
        );

        assert_eq!(score_of(&filter, &msg), -6.0);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let filter = KeywordFilter::default();
        let msg = email(
            "Jane <jane@lever.co>",
            "Staff Developer role",
            "Are you open to a quick chat?",
        );

        assert_eq!(filter.evaluate(&msg), filter.evaluate(&msg));
    }

    #[test]
    fn test_strong_signal_never_lowers_score() {
        let filter = KeywordFilter::default();
        let bodies = [
            "",
            "A great opportunity for the team, fully remote with a bonus.",
            "Flash sale! unsubscribe",
            "Senior developer wanted",
        ];

        for body in bodies {
            let base = email("someone@example.com", "Hello", body);
            let boosted = email(
                "someone@example.com",
                "Hello",
                &format!("{} Background check complete.", body),
            );
            assert!(
                score_of(&filter, &boosted) >= score_of(&filter, &base),
                "score dropped for body {:?}",
                body
            );
        }
    }

    #[test]
    fn test_custom_weights_and_rules() {
        let rules = RuleSet::from_value(json!({"job_source_domains": ["hire.example.org"]})).unwrap();
        let weights = ScoreWeights {
            pass_threshold: 6.0,
            ..Default::default()
        };
        let filter = KeywordFilter::with_weights(&rules, weights).unwrap();

        let msg = email("team@hire.example.org", "Hello", "");
        let decision = filter.evaluate(&msg);

        assert!(!decision.passed);
        assert_eq!(decision.reasons[0], "insufficient job signals");
        assert_eq!(
            decision.reasons.last().unwrap(),
            "score: 5.0 (threshold: 6.0)"
        );
    }

    #[test]
    fn test_weights_deserialize_with_defaults() {
        let weights: ScoreWeights = serde_yaml::from_str("pass_threshold: 4.5\n").unwrap();
        assert_eq!(weights.pass_threshold, 4.5);
        assert_eq!(weights.job_board, 5.0);
        assert_eq!(weights.weak_keyword_min_hits, 3);
    }
}
