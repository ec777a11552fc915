use crate::decision::FilterOutcome;
use crate::email::Email;
use crate::filter::EmailFilter;

/// Ordered chain of filters.
///
/// With `stop_on_reject` (the default) the first rejecting filter ends the
/// evaluation and later filters are never called.
pub struct FilterPipeline {
    filters: Vec<Box<dyn EmailFilter>>,
    stop_on_reject: bool,
}

impl FilterPipeline {
    pub fn new(filters: Vec<Box<dyn EmailFilter>>) -> Self {
        Self {
            filters,
            stop_on_reject: true,
        }
    }

    pub fn with_stop_on_reject(mut self, stop_on_reject: bool) -> Self {
        self.stop_on_reject = stop_on_reject;
        self
    }

    pub fn stop_on_reject(&self) -> bool {
        self.stop_on_reject
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn apply(&self, email: &Email) -> FilterOutcome {
        let mut decisions = Vec::with_capacity(self.filters.len());
        let mut reasons = Vec::new();
        let mut passed = true;

        for filter in &self.filters {
            let decision = filter.evaluate(email);
            reasons.extend(decision.reasons.iter().cloned());
            let rejected = !decision.passed;
            decisions.push(decision);

            if rejected {
                passed = false;
                if self.stop_on_reject {
                    log::debug!("'{}' rejected by {}", email.subject, filter.name());
                    break;
                }
            }
        }

        FilterOutcome {
            passed,
            reasons,
            decisions,
        }
    }

    /// One outcome per email, in input order
    pub fn run(&self, emails: &[Email]) -> Vec<FilterOutcome> {
        let outcomes: Vec<FilterOutcome> = emails.iter().map(|email| self.apply(email)).collect();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        log::info!(
            "Filtered {} emails: {} passed, {} rejected",
            outcomes.len(),
            passed,
            outcomes.len() - passed
        );
        outcomes
    }

    /// Emails whose outcome from [`run`](Self::run) passed, for hand-off to
    /// extraction. Pairs by position, so filters are not evaluated again.
    pub fn passing<'a>(emails: &'a [Email], outcomes: &[FilterOutcome]) -> Vec<&'a Email> {
        emails
            .iter()
            .zip(outcomes)
            .filter(|(_, outcome)| outcome.passed)
            .map(|(email, _)| email)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterDecision;
    use crate::keyword::KeywordFilter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedFilter {
        name: &'static str,
        passed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FixedFilter {
        fn boxed(name: &'static str, passed: bool) -> (Box<dyn EmailFilter>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let filter = FixedFilter {
                name,
                passed,
                calls: calls.clone(),
            };
            (Box::new(filter), calls)
        }
    }

    impl EmailFilter for FixedFilter {
        fn name(&self) -> &str {
            self.name
        }

        fn evaluate(&self, _email: &Email) -> FilterDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reason = format!("{} says {}", self.name, self.passed);
            FilterDecision::new(self.name, self.passed, vec![reason])
        }
    }

    #[test]
    fn test_short_circuit_skips_later_filters() {
        let (first, _) = FixedFilter::boxed("first", false);
        let (second, second_calls) = FixedFilter::boxed("second", true);
        let pipeline = FilterPipeline::new(vec![first, second]);

        let outcome = pipeline.apply(&Email::default());

        assert!(!outcome.passed);
        assert_eq!(outcome.decisions.len(), 1);
        assert_eq!(outcome.reasons, vec!["first says false".to_string()]);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_full_evaluation_collects_every_decision() {
        let (first, _) = FixedFilter::boxed("first", false);
        let (second, second_calls) = FixedFilter::boxed("second", true);
        let pipeline = FilterPipeline::new(vec![first, second]).with_stop_on_reject(false);

        let outcome = pipeline.apply(&Email::default());

        assert!(!outcome.passed);
        assert_eq!(outcome.decisions.len(), 2);
        assert_eq!(
            outcome.reasons,
            vec!["first says false".to_string(), "second says true".to_string()]
        );
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_passing() {
        let (first, _) = FixedFilter::boxed("first", true);
        let (second, _) = FixedFilter::boxed("second", true);
        let pipeline = FilterPipeline::new(vec![first, second]);

        let outcome = pipeline.apply(&Email::default());

        assert!(outcome.passed);
        assert!(outcome.decisions.iter().all(|d| d.passed));
        assert_eq!(pipeline.filter_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_empty_pipeline_passes() {
        let pipeline = FilterPipeline::new(vec![]);
        let outcome = pipeline.apply(&Email::default());

        assert!(outcome.passed);
        assert!(outcome.decisions.is_empty());
    }

    #[test]
    fn test_denylisted_sender_yields_single_decision() {
        let (after, after_calls) = FixedFilter::boxed("after", true);
        let pipeline = FilterPipeline::new(vec![Box::new(KeywordFilter::default()), after]);
        let email = Email::new("deals@e.allegiant.com", "Interview", "Recruiter interview");

        let outcome = pipeline.apply(&email);

        assert!(!outcome.passed);
        assert_eq!(outcome.decisions.len(), 1);
        assert_eq!(outcome.reasons.len(), 1);
        assert!(outcome.reasons[0].starts_with("non-job domain denylist"));
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_preserves_order() {
        let pipeline = FilterPipeline::new(vec![Box::new(KeywordFilter::default())]);
        let emails = vec![
            Email::new("jobs@greenhouse.io", "Senior Engineer - Interview invite", ""),
            Email::new("noreply@shop.example.com", "", "Flash sale! 50% off, unsubscribe here"),
            Email::new("Jane <jane@lever.co>", "Offer letter", "Your offer letter is attached"),
        ];

        let outcomes = pipeline.run(&emails);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(outcomes[2].passed);

        let passing = FilterPipeline::passing(&emails, &outcomes);
        assert_eq!(passing.len(), 2);
        assert_eq!(passing[1].from, "Jane <jane@lever.co>");
    }

    #[test]
    fn test_passing_reuses_outcomes() {
        let (only, calls) = FixedFilter::boxed("only", true);
        let pipeline = FilterPipeline::new(vec![only]);
        let emails = vec![Email::default(), Email::default()];

        let outcomes = pipeline.run(&emails);
        let passing = FilterPipeline::passing(&emails, &outcomes);

        assert_eq!(passing.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pipeline_is_shareable_across_threads() {
        let pipeline = Arc::new(FilterPipeline::new(vec![Box::new(KeywordFilter::default())]));
        let email = Email::new("jobs@lever.co", "Phone screen", "");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                let email = email.clone();
                std::thread::spawn(move || pipeline.apply(&email))
            })
            .collect();

        let expected = pipeline.apply(&email);
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
