//! Sender rules: plain domains, host masks and full-address masks.

use std::fmt;

use serde::Serialize;

use crate::sender::SenderIdentity;
use crate::{Error, Result};

/// A compiled rule. All text is stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "kebab-case")]
pub enum Rule {
    /// `ozon.ru`: the host itself and every subdomain.
    Domain(String),
    /// `*mvideo.ru`: any host ending in the text after the `*`.
    HostMask(String),
    /// `noreply_*@privaterelay.appleid.com`: glob over the whole address.
    AddressMask(String),
}

impl Rule {
    /// Classifies and validates one raw rule.
    ///
    /// Anything with an `@` is an address mask, anything else starting with
    /// `*` is a host mask, the rest are domains.
    pub fn compile(raw: &str) -> Result<Self> {
        let rule = raw.trim().to_lowercase();
        if rule.is_empty() {
            return Err(Error::config("empty rule"));
        }
        if rule.chars().any(char::is_whitespace) {
            return Err(Error::config(format!("rule '{}' contains whitespace", rule)));
        }
        if rule.contains(['?', '[', ']']) {
            return Err(Error::config(format!(
                "rule '{}': only '*' wildcards are supported",
                rule
            )));
        }
        if rule.contains('@') {
            if rule.matches('@').count() != 1 {
                return Err(Error::config(format!(
                    "address rule '{}' must contain exactly one '@'",
                    rule
                )));
            }
            let (local, host) = rule.split_once('@').unwrap_or_default();
            if local.is_empty() || host.is_empty() {
                return Err(Error::config(format!(
                    "address rule '{}' needs both a local part and a host",
                    rule
                )));
            }
            return Ok(Self::AddressMask(rule));
        }
        if let Some(suffix) = rule.strip_prefix('*') {
            if suffix.is_empty() || suffix.contains('*') {
                return Err(Error::config(format!(
                    "host mask '{}' must be a single leading '*' followed by a host suffix",
                    rule
                )));
            }
            return Ok(Self::HostMask(rule));
        }
        if rule.contains('*') {
            return Err(Error::config(format!(
                "domain rule '{}' may only use '*' as its first character",
                rule
            )));
        }
        if rule.starts_with('.') || rule.ends_with('.') {
            return Err(Error::config(format!(
                "domain rule '{}' must not start or end with '.'",
                rule
            )));
        }
        Ok(Self::Domain(rule))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::HostMask(_) => "host-mask",
            Self::AddressMask(_) => "address-mask",
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            Self::Domain(p) | Self::HostMask(p) | Self::AddressMask(p) => p,
        }
    }

    pub fn matches(&self, sender: &SenderIdentity) -> bool {
        match self {
            Self::Domain(domain) => domain_matches(sender.host(), domain),
            Self::HostMask(pattern) => {
                let suffix = &pattern[1..];
                sender.host().ends_with(suffix)
            }
            Self::AddressMask(pattern) => glob_match(pattern, sender.as_str()),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

/// An ordered list of rules, evaluated as a logical OR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compiles every rule, failing on the first bad one. An empty list is
    /// rejected too, since it could never match anything.
    pub fn compile<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = raw
            .into_iter()
            .map(|r| Rule::compile(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if rules.is_empty() {
            return Err(Error::config("no rules provided"));
        }
        Ok(Self { rules })
    }

    /// The first rule, in list order, that matches `sender`.
    pub fn first_match(&self, sender: &SenderIdentity) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(sender))
    }

    pub fn matches(&self, sender: &SenderIdentity) -> bool {
        self.first_match(sender).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    match host.strip_suffix(domain) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

/// `*` matches any run of characters, everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star_pi, star_ti)) = star {
            // let the last star swallow one more character
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Rule, RuleSet, glob_match};
    use crate::Error;
    use crate::sender::SenderIdentity;

    fn sender(s: &str) -> SenderIdentity {
        SenderIdentity::parse(s).unwrap()
    }

    fn rule(s: &str) -> Rule {
        Rule::compile(s).unwrap()
    }

    #[test]
    fn classification_is_syntactic() {
        assert_eq!(rule("ozon.ru"), Rule::Domain("ozon.ru".to_string()));
        assert_eq!(rule("*mvideo.ru"), Rule::HostMask("*mvideo.ru".to_string()));
        assert_eq!(
            rule("news@news.ozon.ru"),
            Rule::AddressMask("news@news.ozon.ru".to_string())
        );
        assert_eq!(
            rule("*reddit*@privaterelay.appleid.com"),
            Rule::AddressMask("*reddit*@privaterelay.appleid.com".to_string())
        );
    }

    #[test]
    fn compile_trims_and_lowercases() {
        assert_eq!(rule("  OZON.ru "), Rule::Domain("ozon.ru".to_string()));
    }

    #[test]
    fn domain_rule_matches_host_and_subdomains_only() {
        let r = rule("ozon.ru");
        assert!(r.matches(&sender("a@ozon.ru")));
        assert!(r.matches(&sender("news@news.ozon.ru")));
        assert!(r.matches(&sender("x@sender.ozon.ru")));
        assert!(!r.matches(&sender("news@notozon.ru")));
        assert!(!r.matches(&sender("a@ozon.ru.evil.com")));
    }

    #[test]
    fn domain_rule_is_case_insensitive() {
        let r = rule("OZON.RU");
        assert!(r.matches(&sender("A@News.Ozon.Ru")));
    }

    #[test]
    fn host_mask_matches_suffix_of_host() {
        let r = rule("*mvideo.ru");
        assert!(r.matches(&sender("x@shop.mvideo.ru")));
        assert!(r.matches(&sender("x@mvideo.ru")));
        assert!(r.matches(&sender("x@newmvideo.ru")));
        assert!(!r.matches(&sender("x@mvideo.ru.evil.com")));
        assert!(!r.matches(&sender("mvideo.ru@other.com")));
    }

    #[test]
    fn address_mask_matches_relay_aliases() {
        let r = rule("noreply_at_redditmail_com_*@privaterelay.appleid.com");
        assert!(r.matches(&sender(
            "noreply_at_redditmail_com_abc123@privaterelay.appleid.com"
        )));
        assert!(!r.matches(&sender("other@privaterelay.appleid.com")));
    }

    #[test]
    fn address_mask_with_several_stars() {
        let r = rule("*reddit*@privaterelay.appleid.com");
        assert!(r.matches(&sender("noreply_at_redditmail_com_x@privaterelay.appleid.com")));
        assert!(!r.matches(&sender("noreply_at_reddit@example.com")));
    }

    #[test]
    fn exact_address_rule() {
        let r = rule("news@news.ozon.ru");
        assert!(r.matches(&sender("news@news.ozon.ru")));
        assert!(!r.matches(&sender("promo@news.ozon.ru")));
    }

    #[test]
    fn invalid_rules_are_config_errors() {
        for bad in [
            "",
            "   ",
            "ozon .ru",
            "oz?n.ru",
            "[ab].ru",
            "mail.*.ru",
            "*",
            "*mail*.ru",
            "a@b@c",
            "@ozon.ru",
            "news@",
            ".ozon.ru",
        ] {
            assert!(
                matches!(Rule::compile(bad), Err(Error::Config(_))),
                "expected config error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn empty_rule_set_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(RuleSet::compile(empty), Err(Error::Config(_))));
    }

    #[test]
    fn rule_set_reports_first_matching_rule() {
        let set = RuleSet::compile(["linkedin.com", "*ozon.ru", "ozon.ru"]).unwrap();
        let hit = set.first_match(&sender("a@news.ozon.ru")).unwrap();
        assert_eq!(hit.pattern(), "*ozon.ru");
        assert!(set.matches(&sender("b@linkedin.com")));
        assert!(!set.matches(&sender("c@other.com")));
    }

    #[test]
    fn one_bad_rule_fails_the_whole_set() {
        let err = RuleSet::compile(["ozon.ru", "mail.*.ru"]).unwrap_err();
        assert!(err.to_string().contains("mail.*.ru"));
    }

    #[test]
    fn glob_basics() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("*@x.com", "me@x.com"));
        assert!(!glob_match("abc", "abcd"));
    }

    proptest! {
        #[test]
        fn domain_rule_matches_iff_host_is_domain_or_subdomain(
            local in "[a-z0-9]{1,8}",
            labels in prop::collection::vec("[a-z0-9]{1,6}", 1..4),
            domain in "[a-z0-9]{1,6}\\.(ru|com)",
            upper in any::<bool>(),
        ) {
            let host = labels.join(".");
            let host = if upper { host.to_uppercase() } else { host };
            for candidate in [host.clone(), format!("{}.{}", host, domain), domain.clone()] {
                let s = SenderIdentity::parse(&format!("{}@{}", local, candidate)).unwrap();
                let h = s.host().to_string();
                let expected = h == domain || h.ends_with(&format!(".{}", domain));
                prop_assert_eq!(Rule::Domain(domain.clone()).matches(&s), expected);
                let shouted = Rule::compile(&domain.to_uppercase()).unwrap();
                prop_assert_eq!(shouted.matches(&s), expected);
            }
        }
    }
}
