use crate::error::{MailSecError, Result};

/// Reduce user input to a bare host name
///
/// Lower-cases, strips a URL scheme, a leading `www.`, any path/query/fragment,
/// a port and a trailing dot. The analyzers expect their input in this form.
pub fn normalize_domain(input: &str) -> Result<String> {
    let mut domain = input.trim().to_lowercase();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = domain.strip_prefix(scheme) {
            domain = rest.to_string();
            break;
        }
    }

    if let Some(end) = domain.find(['/', '?', '#']) {
        domain.truncate(end);
    }
    if let Some(end) = domain.find(':') {
        domain.truncate(end);
    }
    if let Some(rest) = domain.strip_prefix("www.") {
        domain = rest.to_string();
    }
    let domain = domain.trim_end_matches('.').to_string();

    validate_domain(&domain)?;
    Ok(domain)
}

fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(MailSecError::InvalidDomain("Domain is empty".to_string()));
    }

    if domain.len() > 253 {
        return Err(MailSecError::InvalidDomain(
            "Domain is longer than 253 characters".to_string(),
        ));
    }

    if !domain.contains('.') {
        return Err(MailSecError::InvalidDomain(
            "Domain must contain a dot".to_string(),
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(MailSecError::InvalidDomain(format!(
                "Invalid label in {}",
                domain
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(MailSecError::InvalidDomain(format!(
                "Label may not start or end with a hyphen: {}",
                label
            )));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(MailSecError::InvalidDomain(format!(
                "Invalid characters in {}",
                domain
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain() {
        assert_eq!(normalize_domain("example.com").unwrap(), "example.com");
        assert_eq!(normalize_domain("  Example.COM ").unwrap(), "example.com");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_domain("https://www.Example.com/path?q=1").unwrap(),
            "example.com"
        );
        assert_eq!(
            normalize_domain("http://mail.example.co.uk:8080/").unwrap(),
            "mail.example.co.uk"
        );
        assert_eq!(normalize_domain("example.com.").unwrap(), "example.com");
    }

    #[test]
    fn test_invalid_domains() {
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("localhost").is_err());
        assert!(normalize_domain("exa mple.com").is_err());
        assert!(normalize_domain("-bad.com").is_err());
        assert!(normalize_domain("a..com").is_err());
        assert!(normalize_domain("https://").is_err());
    }
}
