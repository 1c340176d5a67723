//! Shared priority-ordered rule evaluator (spec §4.5), generalized over the
//! Recording-rule and ticket-routing-rule domains. Predicates are combined
//! by AND within a rule; rules are OR'd in descending `priority`; first
//! match wins.

use nimbus_types::{DomainMode, RecordingRule, RoutingRule};

pub struct MatchOutcome<'a, R> {
    pub rule: &'a R,
    pub test_mode: bool,
}

/// Evaluates recording rules against a calendar-event candidate. Predicate
/// order: title-exclude keywords, attendee count range, domain mode,
/// title-include keywords (any match).
pub fn evaluate_recording_rules<'a>(
    rules: &'a [RecordingRule],
    title: &str,
    attendee_count: u32,
    attendee_domains: &[String],
) -> Option<MatchOutcome<'a, RecordingRule>> {
    let mut sorted: Vec<&RecordingRule> = rules.iter().filter(|r| r.enabled).collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

    let title_lower = title.to_ascii_lowercase();

    for rule in sorted {
        if rule
            .title_exclude_keywords
            .iter()
            .any(|kw| title_lower.contains(&kw.to_ascii_lowercase()))
        {
            continue;
        }
        if let Some(min) = rule.min_attendees {
            if attendee_count < min {
                continue;
            }
        }
        if let Some(max) = rule.max_attendees {
            if attendee_count > max {
                continue;
            }
        }
        if !domain_mode_matches(rule.domain_mode, &rule.specific_domains, attendee_domains) {
            continue;
        }
        if !rule.title_include_keywords.is_empty()
            && !rule
                .title_include_keywords
                .iter()
                .any(|kw| title_lower.contains(&kw.to_ascii_lowercase()))
        {
            continue;
        }
        return Some(MatchOutcome { rule, test_mode: rule.test_mode });
    }
    None
}

fn domain_mode_matches(mode: DomainMode, specific: &[String], attendee_domains: &[String]) -> bool {
    match mode {
        DomainMode::All => true,
        DomainMode::ExternalOnly => !specific.is_empty() && attendee_domains.iter().any(|d| !specific.contains(d)),
        DomainMode::InternalOnly => attendee_domains.iter().all(|d| specific.contains(d)),
        DomainMode::SpecificDomains => attendee_domains.iter().any(|d| specific.contains(d)),
    }
}

pub struct RoutingMatchInput<'a> {
    pub environment: Option<&'a str>,
    pub level: Option<&'a str>,
    pub release: Option<&'a str>,
    pub title: &'a str,
}

/// Evaluates ticket-routing rules. Release patterns are plain substrings
/// here (regex compilation is the caller's concern per rule load, per
/// spec §4.5 "compiled once and cached" — the cache lives in the caller).
pub fn evaluate_routing_rules<'a>(
    rules: &'a [RoutingRule],
    input: &RoutingMatchInput,
) -> Option<MatchOutcome<'a, RoutingRule>> {
    let mut sorted: Vec<&RoutingRule> = rules.iter().filter(|r| r.enabled).collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

    for rule in sorted {
        if let Some(env) = &rule.match_environment {
            if Some(env.as_str()) != input.environment {
                continue;
            }
        }
        if let Some(level) = &rule.match_level {
            if Some(level.as_str()) != input.level {
                continue;
            }
        }
        if let Some(pattern) = &rule.match_release_pattern {
            match input.release {
                Some(release) if release.contains(pattern.as_str()) => {}
                _ => continue,
            }
        }
        if let Some(contains) = &rule.match_title_contains {
            if !input.title.to_ascii_lowercase().contains(&contains.to_ascii_lowercase()) {
                continue;
            }
        }
        return Some(MatchOutcome { rule, test_mode: rule.test_mode });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base_rule(priority: i32) -> RecordingRule {
        RecordingRule {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            priority,
            enabled: true,
            title_exclude_keywords: vec![],
            title_include_keywords: vec![],
            min_attendees: None,
            max_attendees: None,
            domain_mode: DomainMode::All,
            specific_domains: vec![],
            target_project_id: None,
            target_priority: None,
            target_owner: None,
            test_mode: false,
        }
    }

    #[test]
    fn higher_priority_rule_wins_first_match() {
        let mut low = base_rule(1);
        low.target_project_id = Some("low".into());
        let mut high = base_rule(10);
        high.target_project_id = Some("high".into());
        let rules = vec![low, high];
        let matched = evaluate_recording_rules(&rules, "Standup", 3, &[]).unwrap();
        assert_eq!(matched.rule.target_project_id.as_deref(), Some("high"));
    }

    #[test]
    fn exclude_keyword_skips_rule() {
        let mut rule = base_rule(5);
        rule.title_exclude_keywords = vec!["1:1".into()];
        let rules = vec![rule];
        assert!(evaluate_recording_rules(&rules, "Weekly 1:1", 2, &[]).is_none());
    }

    #[test]
    fn attendee_range_is_enforced() {
        let mut rule = base_rule(5);
        rule.min_attendees = Some(3);
        let rules = vec![rule];
        assert!(evaluate_recording_rules(&rules, "Planning", 2, &[]).is_none());
        assert!(evaluate_recording_rules(&rules, "Planning", 3, &[]).is_some());
    }
}
