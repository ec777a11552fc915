use regex::Regex;
use std::sync::OnceLock;

/// Sender address and domain-list helpers
pub struct DomainUtils;

fn address_regex() -> &'static Regex {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    ADDRESS.get_or_init(|| {
        Regex::new(r"(?i)([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})").unwrap()
    })
}

impl DomainUtils {
    /// Extract the first email address from a From header such as
    /// `"Jane Recruiter <jane@lever.co>"`, lower-cased
    pub fn extract_address(from_header: &str) -> Option<String> {
        address_regex()
            .captures(from_header)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    /// Extract domain from email address
    pub fn extract_domain(email: &str) -> Option<String> {
        email
            .split_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .filter(|domain| !domain.is_empty())
    }

    /// Extract the local part (before `@`) from email address
    pub fn extract_local_part(email: &str) -> Option<String> {
        email
            .split_once('@')
            .map(|(local, _)| local.to_lowercase())
            .filter(|local| !local.is_empty())
    }

    /// Exact, case-insensitive membership
    pub fn matches_exact(domain: &str, domain_list: &[String]) -> bool {
        let domain_lower = domain.to_lowercase();
        domain_list
            .iter()
            .any(|entry| entry.to_lowercase() == domain_lower)
    }

    /// Check if domain matches any in list (with hierarchy support)
    pub fn matches_domain_list(domain: &str, domain_list: &[String]) -> bool {
        let domain_lower = domain.to_lowercase();

        for pattern in domain_list {
            let pattern_lower = pattern.to_lowercase();

            // Exact match
            if domain_lower == pattern_lower {
                return true;
            }

            // Subdomain match (domain ends with .pattern)
            if domain_lower.ends_with(&format!(".{}", pattern_lower)) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_address() {
        assert_eq!(
            DomainUtils::extract_address("Jane Recruiter <Jane.Doe@Lever.co>"),
            Some("jane.doe@lever.co".to_string())
        );
        assert_eq!(
            DomainUtils::extract_address("jobs@greenhouse.io"),
            Some("jobs@greenhouse.io".to_string())
        );
        assert_eq!(DomainUtils::extract_address("Undisclosed sender"), None);
        assert_eq!(DomainUtils::extract_address(""), None);
    }

    #[test]
    fn test_extract_domain_and_local_part() {
        assert_eq!(
            DomainUtils::extract_domain("user@Example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(DomainUtils::extract_domain("invalid"), None);
        assert_eq!(
            DomainUtils::extract_local_part("No-Reply@shop.example.com"),
            Some("no-reply".to_string())
        );
        assert_eq!(DomainUtils::extract_local_part("@example.com"), None);
    }

    #[test]
    fn test_matches_exact() {
        let denylist = vec!["email.meetup.com".to_string()];

        assert!(DomainUtils::matches_exact("email.meetup.com", &denylist));
        assert!(DomainUtils::matches_exact("Email.Meetup.com", &denylist));
        assert!(!DomainUtils::matches_exact("meetup.com", &denylist));
        assert!(!DomainUtils::matches_exact("x.email.meetup.com", &denylist));
    }

    #[test]
    fn test_matches_domain_list() {
        let domains = vec!["greenhouse.io".to_string(), "lever.co".to_string()];

        assert!(DomainUtils::matches_domain_list("greenhouse.io", &domains));
        assert!(DomainUtils::matches_domain_list(
            "us.greenhouse.io",
            &domains
        ));
        assert!(!DomainUtils::matches_domain_list("fakegreenhouse.io", &domains));
        assert!(!DomainUtils::matches_domain_list("other.com", &domains));
    }
}
