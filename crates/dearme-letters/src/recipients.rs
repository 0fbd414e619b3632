use dearme_types::normalize::parse_external_emails;

/// Internal addresses first, then the parsed external list. Blank entries
/// are dropped and case-insensitive duplicates keep their first spelling.
pub fn collect_recipients(internal: &[String], external_emails: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let external = parse_external_emails(external_emails);

    for addr in internal.iter().map(|a| a.trim()).chain(external.iter().map(String::as_str)) {
        if addr.is_empty() || out.iter().any(|seen| seen.eq_ignore_ascii_case(addr)) {
            continue;
        }
        out.push(addr.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_first_then_external() {
        let got = collect_recipients(
            &["bob@example.com".into(), " ".into()],
            "a@x.com, , b@y.com",
        );
        assert_eq!(got, vec!["bob@example.com", "a@x.com", "b@y.com"]);
    }

    #[test]
    fn duplicates_collapse_case_insensitively() {
        let got = collect_recipients(&["Bob@Example.com".into()], "bob@example.com,A@x.com,a@X.com");
        assert_eq!(got, vec!["Bob@Example.com", "A@x.com"]);
    }

    #[test]
    fn nothing_in_nothing_out() {
        assert!(collect_recipients(&[], " , ,").is_empty());
    }
}
