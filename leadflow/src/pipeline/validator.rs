//! Syntactic scrubbing of raw leads.
//!
//! Validation is a projection: invalid fields are nulled in the output view,
//! valid fields pass through untouched, and applying it twice yields the
//! same view. Callers treat a `None` field as "unknown".

use crate::db::models::leads::RawLead;
use crate::types::RawLeadId;
use url::Url;

/// Raw lead with invalid fields nulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLead {
    pub raw_lead_id: RawLeadId,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
}

/// Matches `^[^@\s]+@[^@\s]+\.[^@\s]+$` without pulling in a regex engine:
/// exactly one `@`, a dot in the domain, and no whitespace anywhere.
fn is_valid_email(value: &str) -> bool {
    if value.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let Some(domain) = parts.next() else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // The domain needs a dot with at least one character on each side; any
    // interior dot qualifies.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// A phone survives when it carries at least 7 digits.
fn is_valid_phone(value: &str) -> bool {
    value.chars().filter(|c| c.is_ascii_digit()).count() >= 7
}

/// A website survives when it parses with a scheme and a host, retrying with
/// an `http://` prefix when the scheme is missing.
fn is_valid_website(value: &str) -> bool {
    let has_host = |url: &Url| url.host_str().is_some_and(|h| !h.is_empty());
    match Url::parse(value) {
        Ok(url) if has_host(&url) => true,
        _ => Url::parse(&format!("http://{value}")).is_ok_and(|url| has_host(&url)),
    }
}

/// Produce the validated view of one raw lead. Never fails.
pub fn validate(raw: &RawLead) -> ValidatedLead {
    let keep = |value: &Option<String>, ok: fn(&str) -> bool| {
        value.as_deref().filter(|v| ok(v)).map(str::to_string)
    };
    ValidatedLead {
        raw_lead_id: raw.id,
        name: raw.name.clone(),
        company_name: raw.company_name.clone(),
        phone: keep(&raw.phone, is_valid_phone),
        email: keep(&raw.email, is_valid_email),
        website: keep(&raw.website, is_valid_website),
        industry: raw.industry.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(email: Option<&str>, phone: Option<&str>, website: Option<&str>) -> RawLead {
        RawLead {
            id: 1,
            name: Some("Jo".into()),
            company_name: Some("Jo's Plumbing".into()),
            email: email.map(String::from),
            phone: phone.map(String::from),
            website: website.map(String::from),
            industry: Some("plumbing".into()),
            source_id: 1,
            captured_at: Utc::now(),
            raw_data: None,
        }
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        // A trailing dot is fine as long as an interior dot splits the
        // domain into two non-empty parts.
        assert!(is_valid_email("a@a.b."));
        assert!(is_valid_email("a@sub.domain.org."));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a b@x.co"));
        assert!(!is_valid_email("a@@x.co"));
        assert!(!is_valid_email("@x.co"));
        assert!(!is_valid_email("a@.co"));
        assert!(!is_valid_email("a@x."));
    }

    #[test]
    fn phone_rules() {
        assert!(is_valid_phone("+1 (555) 123-4567"));
        assert!(is_valid_phone("1234567"));
        assert!(!is_valid_phone("123456"));
        assert!(!is_valid_phone("call me"));
    }

    #[test]
    fn website_rules() {
        assert!(is_valid_website("https://example.com"));
        assert!(is_valid_website("example.com"));
        assert!(is_valid_website("example.com/path"));
        assert!(!is_valid_website(""));
        assert!(!is_valid_website("   "));
    }

    #[test]
    fn invalid_fields_become_null() {
        let view = validate(&raw(Some("bad-email"), Some("12"), Some("https://ok.example")));
        assert_eq!(view.email, None);
        assert_eq!(view.phone, None);
        assert_eq!(view.website.as_deref(), Some("https://ok.example"));
        assert_eq!(view.company_name.as_deref(), Some("Jo's Plumbing"));
    }

    #[test]
    fn validation_is_a_projection() {
        let view = validate(&raw(Some("a@b.co"), Some("notaphone"), Some("example.com")));
        // Re-validating the surviving view changes nothing.
        let again = ValidatedLead {
            raw_lead_id: view.raw_lead_id,
            name: view.name.clone(),
            company_name: view.company_name.clone(),
            phone: view.phone.as_deref().filter(|p| is_valid_phone(p)).map(String::from),
            email: view.email.as_deref().filter(|e| is_valid_email(e)).map(String::from),
            website: view
                .website
                .as_deref()
                .filter(|w| is_valid_website(w))
                .map(String::from),
            industry: view.industry.clone(),
        };
        assert_eq!(view, again);
    }
}
