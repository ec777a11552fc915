//! Pattern and domain lists that drive the keyword scorer.
//!
//! [`RuleSet::default`] is the built-in rule set. Rule files override it one
//! category at a time: a category present in the file replaces the default
//! list wholesale, a missing category keeps the default, and unknown keys are
//! ignored so older binaries can read newer files.

use anyhow::{anyhow, bail, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Applicant-tracking systems and job boards (exact or subdomain match)
    pub job_source_domains: Vec<String>,
    /// Senders that are never job mail (exact match)
    pub non_job_domains: Vec<String>,
    /// Strong keywords, matched as plain substrings
    pub job_keywords: Vec<String>,
    /// Generic keywords that only count in aggregate, matched as whole words
    pub weak_job_keywords: Vec<String>,
    pub role_title_patterns: Vec<String>,
    pub promo_negative_patterns: Vec<String>,
    pub edu_negative_patterns: Vec<String>,
    pub strong_job_signal_patterns: Vec<String>,
    /// Context required before "schedule" counts as a keyword
    pub interview_context_patterns: Vec<String>,
    /// Context required before a bare "oa" counts as a keyword
    pub oa_assessment_patterns: Vec<String>,
    /// Matched against the sender's local part
    pub promo_sender_patterns: Vec<String>,
    /// Matched against the sender's domain
    pub commercial_subdomain_patterns: Vec<String>,
    pub transactional_patterns: Vec<String>,
    pub marketing_footer_patterns: Vec<String>,
}

/// Category keys understood by [`RuleSet::from_value`]
pub const CATEGORIES: &[&str] = &[
    "job_source_domains",
    "non_job_domains",
    "job_keywords",
    "weak_job_keywords",
    "role_title_patterns",
    "promo_negative_patterns",
    "edu_negative_patterns",
    "strong_job_signal_patterns",
    "interview_context_patterns",
    "oa_assessment_patterns",
    "promo_sender_patterns",
    "commercial_subdomain_patterns",
    "transactional_patterns",
    "marketing_footer_patterns",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            job_source_domains: strings(&[
                "greenhouse.io",
                "lever.co",
                "workable.com",
                "icims.com",
                "ashbyhq.com",
                "smartrecruiters.com",
                "myworkday.com",
                "jobvite.com",
                "linkedin.com",
                "indeed.com",
                "glassdoor.com",
            ]),
            non_job_domains: strings(&[
                "e.allegiant.com",
                "email.meetup.com",
                "announcements.soundcloud.com",
                "emaildl.att-mail.com",
                "sfmc2.edx.org",
            ]),
            job_keywords: strings(&[
                "recruiter",
                "recruiting",
                "talent acquisition",
                "talent partner",
                "sourcer",
                "are you open to",
                "are you interested",
                "would you be interested",
                "quick chat",
                "calendar link",
                "job description",
                "responsibilities",
                "offer letter",
                "compensation",
                "base salary",
                "visa sponsorship",
                "start date",
                "background check",
                "candidacy",
                "cover letter",
                "phone screen",
                "interview",
                "interview loop",
                "take-home",
                "coding challenge",
                "technical screen",
                "onsite",
                "final round",
                "time slots",
                "internship",
                "apprenticeship",
                "new grad",
                "job alert",
                "jobs you may like",
                "recommended jobs",
                "saved job",
                "application status",
                "your application",
                "no longer under consideration",
                "we decided to move forward",
                "thank you for applying",
            ]),
            weak_job_keywords: strings(&[
                "opportunity",
                "opportunities",
                "role",
                "position",
                "opening",
                "vacancy",
                "hiring",
                "career",
                "careers",
                "team",
                "experience",
                "resume",
                "cv",
                "jd",
                "portfolio",
                "salary",
                "benefits",
                "bonus",
                "relocation",
                "sponsorship",
                "remote",
                "hybrid",
                "full-time",
                "contract",
                "apply",
                "application",
                "applied",
                "submission",
                "screening",
                "assessment",
                "assignment",
                "offer",
                "next steps",
            ]),
            role_title_patterns: strings(&[
                r"\bsoftware engineer\b",
                r"\bdeveloper\b",
                r"\bdata scientist\b",
                r"\bnlp\b",
                r"\bml engineer\b|\bmachine learning\b",
                r"\bproduct manager\b",
                r"\bproject manager\b",
                r"\bdevops\b",
                r"\bsite reliability\b|\bsre\b",
                r"\bsecurity engineer\b",
                r"\bsolutions engineer\b",
                r"\bsales engineer\b",
                r"\baccount executive\b",
                r"\bsdr\b|\bbdr\b",
                r"\bsales ops\b",
                r"\bsalesforce\b",
                r"\bcustomer success\b",
                r"\bprincipal\b|\bstaff\b|\bsenior\b|\bjunior\b",
                r"\banalyst\b",
                r"\binternship\b",
                r"\bintern\b",
            ]),
            promo_negative_patterns: strings(&[
                r"\bfree shipping\b",
                r"\bpromo code\b",
                r"\bcoupon\b",
                r"\bdiscount\b",
                r"\bclearance\b",
                r"\bflash sale\b",
                r"\b\d{1,2}% off\b",
                r"\bshop now\b",
                r"\bbuy now\b",
                r"\blimited[- ]time offer\b",
                r"\bdeal of the day\b",
                r"\byour cart\b",
                r"\bnewsletter\b",
            ]),
            edu_negative_patterns: strings(&[
                r"\badmissions?\b",
                r"\bapply(ing)?\b.*\b(program|degree|master|ms|m\.s\.|mba|certificate)\b",
                r"\bonline master\b",
                r"\buniversity\b",
                r"\bschool of\b",
                r"\bberkeley\b",
                r"\bedx\b",
                r"\btuition\b",
                r"\benroll\b",
                r"\bgraduate program\b",
            ]),
            strong_job_signal_patterns: strings(&[
                r"\boffer letter\b",
                r"\binterview\b",
                r"\bphone screen\b",
                r"\btechnical screen\b",
                r"\bonsite\b",
                r"\bfinal round\b",
                r"\brecruit(er|ing)\b|\btalent acquisition\b|\bsourcer\b",
                r"\bapplication (received|submitted|status)\b",
                r"\bcandidate\b",
                r"\bbackground check\b",
                r"\bjob description\b|\bresponsibilities\b|\brequirements\b",
                r"\bcompensation\b|\bbase salary\b|\bequity\b|\brsu\b",
                r"\binternship\b|\bintern\b|\bco-?op\b|\bapprenticeship\b",
            ]),
            interview_context_patterns: strings(&[
                r"\binterview\b",
                r"\bphone screen\b",
                r"\btechnical screen\b",
                r"\bonsite\b",
                r"\bfinal round\b",
                r"\brecruit(er|ing)\b",
                r"\btalent acquisition\b",
            ]),
            oa_assessment_patterns: strings(&[
                r"\b(online assessment|assessment|coding challenge|take[- ]home|hacker(rank)?|codesignal|codility|karat)\b",
            ]),
            promo_sender_patterns: strings(&[
                r"^no[-_.]?reply",
                r"^do[-_.]?not[-_.]?reply",
                r"^(news(letter)?|marketing|promo(tions?)?|deals|offers|specials|sales)\b",
            ]),
            commercial_subdomain_patterns: strings(&[
                r"^(e|em|email|mail|mailer|news|newsletter|marketing|mkt|promo|offers|info|click|engage)\.[^.]+\.[^.]+",
            ]),
            transactional_patterns: strings(&[
                r"\border (confirmed|confirmation)\b",
                r"\bshipping (update|notification)\b",
                r"\bhas (been )?(shipped|delivered)\b",
                r"\btracking number\b",
                r"\byour (online )?bill\b",
                r"\bbill is ready\b",
                r"\bpayment (due|received|confirmation)\b",
                r"\baccount number\b",
                r"\breceipt\b",
                r"\bpassword reset\b",
                r"\bverification code\b",
            ]),
            marketing_footer_patterns: strings(&[
                r"\bunsubscribe\b",
                r"\bmanage (your )?(email )?preferences\b",
                r"\bupdate your (email )?preferences\b",
                r"\bview (this email )?in (your )?browser\b",
                r"\byou are receiving this (email|message)\b",
                r"\bopt[- ]out\b",
            ]),
        }
    }
}

/// A partial rule set: every category is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleSetOverride {
    pub job_source_domains: Option<Vec<String>>,
    pub non_job_domains: Option<Vec<String>>,
    pub job_keywords: Option<Vec<String>>,
    pub weak_job_keywords: Option<Vec<String>>,
    pub role_title_patterns: Option<Vec<String>>,
    pub promo_negative_patterns: Option<Vec<String>>,
    pub edu_negative_patterns: Option<Vec<String>>,
    pub strong_job_signal_patterns: Option<Vec<String>>,
    pub interview_context_patterns: Option<Vec<String>>,
    pub oa_assessment_patterns: Option<Vec<String>>,
    pub promo_sender_patterns: Option<Vec<String>>,
    pub commercial_subdomain_patterns: Option<Vec<String>>,
    pub transactional_patterns: Option<Vec<String>>,
    pub marketing_footer_patterns: Option<Vec<String>>,
}

impl RuleSet {
    /// Apply `overrides` on top of `self`, replacing whole categories
    pub fn merged(self, overrides: RuleSetOverride) -> Self {
        RuleSet {
            job_source_domains: overrides
                .job_source_domains
                .unwrap_or(self.job_source_domains),
            non_job_domains: overrides.non_job_domains.unwrap_or(self.non_job_domains),
            job_keywords: overrides.job_keywords.unwrap_or(self.job_keywords),
            weak_job_keywords: overrides
                .weak_job_keywords
                .unwrap_or(self.weak_job_keywords),
            role_title_patterns: overrides
                .role_title_patterns
                .unwrap_or(self.role_title_patterns),
            promo_negative_patterns: overrides
                .promo_negative_patterns
                .unwrap_or(self.promo_negative_patterns),
            edu_negative_patterns: overrides
                .edu_negative_patterns
                .unwrap_or(self.edu_negative_patterns),
            strong_job_signal_patterns: overrides
                .strong_job_signal_patterns
                .unwrap_or(self.strong_job_signal_patterns),
            interview_context_patterns: overrides
                .interview_context_patterns
                .unwrap_or(self.interview_context_patterns),
            oa_assessment_patterns: overrides
                .oa_assessment_patterns
                .unwrap_or(self.oa_assessment_patterns),
            promo_sender_patterns: overrides
                .promo_sender_patterns
                .unwrap_or(self.promo_sender_patterns),
            commercial_subdomain_patterns: overrides
                .commercial_subdomain_patterns
                .unwrap_or(self.commercial_subdomain_patterns),
            transactional_patterns: overrides
                .transactional_patterns
                .unwrap_or(self.transactional_patterns),
            marketing_footer_patterns: overrides
                .marketing_footer_patterns
                .unwrap_or(self.marketing_footer_patterns),
        }
    }

    /// Build a rule set from a structured override merged over the default.
    ///
    /// `null` means no overrides. Any other non-mapping value, or a known
    /// category whose value is not a list of strings, is an error.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let map = match value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(map) => map,
            other => bail!("Rule overrides must be a mapping, got {}", kind_of(&other)),
        };

        let mut overrides = RuleSetOverride::default();
        for (key, value) in map {
            let slot = match overrides.slot_mut(&key) {
                Some(slot) => slot,
                None => {
                    log::debug!("Ignoring unknown rule category: {}", key);
                    continue;
                }
            };
            let list: Vec<String> = serde_json::from_value(value).map_err(|e| {
                anyhow!("Rule category `{}` must be a list of strings: {}", key, e)
            })?;
            *slot = Some(list);
        }

        Ok(Self::default().merged(overrides))
    }

    /// Load a rule file. `.yaml`/`.yml` files are parsed as YAML, anything
    /// else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule file {}", path.display()))?;

        let value: serde_json::Value = if is_yaml(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in rule file {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in rule file {}", path.display()))?
        };

        Self::from_value(value).with_context(|| format!("Invalid rule file {}", path.display()))
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write rule file {}", path.display()))?;
        Ok(())
    }

    /// Category sizes in [`CATEGORIES`] order
    pub fn category_sizes(&self) -> Vec<(&'static str, usize)> {
        CATEGORIES
            .iter()
            .map(|&name| (name, self.category(name).map(|c| c.len()).unwrap_or(0)))
            .collect()
    }

    pub fn category(&self, name: &str) -> Option<&[String]> {
        let list = match name {
            "job_source_domains" => &self.job_source_domains,
            "non_job_domains" => &self.non_job_domains,
            "job_keywords" => &self.job_keywords,
            "weak_job_keywords" => &self.weak_job_keywords,
            "role_title_patterns" => &self.role_title_patterns,
            "promo_negative_patterns" => &self.promo_negative_patterns,
            "edu_negative_patterns" => &self.edu_negative_patterns,
            "strong_job_signal_patterns" => &self.strong_job_signal_patterns,
            "interview_context_patterns" => &self.interview_context_patterns,
            "oa_assessment_patterns" => &self.oa_assessment_patterns,
            "promo_sender_patterns" => &self.promo_sender_patterns,
            "commercial_subdomain_patterns" => &self.commercial_subdomain_patterns,
            "transactional_patterns" => &self.transactional_patterns,
            "marketing_footer_patterns" => &self.marketing_footer_patterns,
            _ => return None,
        };
        Some(list)
    }

    /// Validate and compile every pattern category
    pub fn compile(&self) -> Result<CompiledRules> {
        let weak_keywords = self
            .weak_job_keywords
            .iter()
            .map(|kw| {
                let regex = build_regex(&format!(r"\b{}\b", regex::escape(kw)))
                    .with_context(|| format!("Invalid weak keyword `{}`", kw))?;
                Ok((kw.to_lowercase(), regex))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledRules {
            job_source_domains: self.job_source_domains.clone(),
            non_job_domains: self.non_job_domains.clone(),
            job_keywords: self.job_keywords.iter().map(|k| k.to_lowercase()).collect(),
            weak_keywords,
            role_titles: PatternList::compile("role_title_patterns", &self.role_title_patterns)?,
            promo_content: PatternList::compile(
                "promo_negative_patterns",
                &self.promo_negative_patterns,
            )?,
            education: PatternList::compile("edu_negative_patterns", &self.edu_negative_patterns)?,
            strong_signals: PatternList::compile(
                "strong_job_signal_patterns",
                &self.strong_job_signal_patterns,
            )?,
            interview_context: PatternList::compile(
                "interview_context_patterns",
                &self.interview_context_patterns,
            )?,
            assessment_context: PatternList::compile(
                "oa_assessment_patterns",
                &self.oa_assessment_patterns,
            )?,
            promo_senders: PatternList::compile(
                "promo_sender_patterns",
                &self.promo_sender_patterns,
            )?,
            commercial_subdomains: PatternList::compile(
                "commercial_subdomain_patterns",
                &self.commercial_subdomain_patterns,
            )?,
            transactional: PatternList::compile(
                "transactional_patterns",
                &self.transactional_patterns,
            )?,
            marketing_footer: PatternList::compile(
                "marketing_footer_patterns",
                &self.marketing_footer_patterns,
            )?,
        })
    }
}

impl RuleSetOverride {
    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<Vec<String>>> {
        let slot = match key {
            "job_source_domains" => &mut self.job_source_domains,
            "non_job_domains" => &mut self.non_job_domains,
            "job_keywords" => &mut self.job_keywords,
            "weak_job_keywords" => &mut self.weak_job_keywords,
            "role_title_patterns" => &mut self.role_title_patterns,
            "promo_negative_patterns" => &mut self.promo_negative_patterns,
            "edu_negative_patterns" => &mut self.edu_negative_patterns,
            "strong_job_signal_patterns" => &mut self.strong_job_signal_patterns,
            "interview_context_patterns" => &mut self.interview_context_patterns,
            "oa_assessment_patterns" => &mut self.oa_assessment_patterns,
            "promo_sender_patterns" => &mut self.promo_sender_patterns,
            "commercial_subdomain_patterns" => &mut self.commercial_subdomain_patterns,
            "transactional_patterns" => &mut self.transactional_patterns,
            "marketing_footer_patterns" => &mut self.marketing_footer_patterns,
            _ => return None,
        };
        Some(slot)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}

fn build_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Compiled, case-insensitive patterns of one category
#[derive(Debug, Clone)]
pub struct PatternList {
    patterns: Vec<Regex>,
}

impl PatternList {
    pub fn compile(category: &str, patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                build_regex(p)
                    .with_context(|| format!("Invalid pattern in `{}`: {}", category, p))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Source text of every matching pattern, in list order
    pub fn hits(&self, text: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.is_match(text))
            .map(|p| p.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A [`RuleSet`] with every pattern compiled. Read-only and shareable
/// across threads.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub job_source_domains: Vec<String>,
    pub non_job_domains: Vec<String>,
    pub job_keywords: Vec<String>,
    pub weak_keywords: Vec<(String, Regex)>,
    pub role_titles: PatternList,
    pub promo_content: PatternList,
    pub education: PatternList,
    pub strong_signals: PatternList,
    pub interview_context: PatternList,
    pub assessment_context: PatternList,
    pub promo_senders: PatternList,
    pub commercial_subdomains: PatternList,
    pub transactional: PatternList,
    pub marketing_footer: PatternList,
}
