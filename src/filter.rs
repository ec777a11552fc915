//! The filter capability shared by every classifier.
//!
//! A filter looks at one email and returns a [`FilterDecision`]. Rule-based
//! and model-based filters implement the same trait and can be mixed freely
//! inside a [`FilterPipeline`](crate::pipeline::FilterPipeline).

use crate::decision::FilterDecision;
use crate::email::Email;

pub trait EmailFilter: Send + Sync {
    /// Identifier used in decisions, analytics and logs
    fn name(&self) -> &str;

    /// Decide whether `email` looks like a job opportunity.
    ///
    /// Must not mutate the email or any shared configuration.
    fn evaluate(&self, email: &Email) -> FilterDecision;
}

impl<F: EmailFilter + ?Sized> EmailFilter for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, email: &Email) -> FilterDecision {
        (**self).evaluate(email)
    }
}

impl<F: EmailFilter + ?Sized> EmailFilter for std::sync::Arc<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, email: &Email) -> FilterDecision {
        (**self).evaluate(email)
    }
}
