//! Header condition evaluation for conditional payment rules

use axum::http::HeaderMap;

use crate::crd::ConditionAction;
use crate::store::CompiledCondition;

/// Decide whether a request must pay, for a rule in conditional mode.
///
/// Conditions are walked in declared order. A missing or empty header skips
/// its condition; the first condition whose pattern matches decides
/// (`pay` requires payment, `free` waives it). When nothing matches, payment
/// is required - the safe default.
pub fn payment_required(headers: &HeaderMap, conditions: &[CompiledCondition]) -> bool {
    for cond in conditions {
        let value = headers
            .get(cond.header.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if value.is_empty() {
            continue;
        }
        if cond.pattern.is_match(value) {
            return cond.action == ConditionAction::Pay;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use regex::Regex;

    fn cond(header: &str, pattern: &str, action: ConditionAction) -> CompiledCondition {
        CompiledCondition {
            header: header.to_string(),
            pattern: Regex::new(pattern).unwrap(),
            action,
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*k).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    /// Story: bots pay, browsers browse. A route charges crawlers by matching
    /// the User-Agent while human traffic passes for free.
    #[test]
    fn story_bots_pay_browsers_ride_free() {
        let conditions = vec![cond("User-Agent", "(?i)bot", ConditionAction::Pay)];

        assert!(payment_required(
            &headers(&[("User-Agent", "my-bot/1.0")]),
            &conditions
        ));
        // Mozilla does not match the bot pattern, and no condition matched,
        // so the safe default kicks in: still pay.
        assert!(payment_required(
            &headers(&[("User-Agent", "Mozilla/5.0")]),
            &conditions
        ));
    }

    #[test]
    fn test_free_action_waives_payment() {
        let conditions = vec![
            cond("User-Agent", "(?i)mozilla", ConditionAction::Free),
            cond("User-Agent", ".*", ConditionAction::Pay),
        ];
        assert!(!payment_required(
            &headers(&[("User-Agent", "Mozilla/5.0")]),
            &conditions
        ));
        assert!(payment_required(
            &headers(&[("User-Agent", "curl/8.0")]),
            &conditions
        ));
    }

    #[test]
    fn test_first_matching_condition_wins() {
        let conditions = vec![
            cond("X-Tier", "gold", ConditionAction::Free),
            cond("X-Tier", ".*", ConditionAction::Pay),
        ];
        assert!(!payment_required(&headers(&[("X-Tier", "gold")]), &conditions));
        assert!(payment_required(&headers(&[("X-Tier", "silver")]), &conditions));
    }

    #[test]
    fn test_missing_header_skips_condition() {
        let conditions = vec![
            cond("X-Absent", ".*", ConditionAction::Free),
            cond("X-Tier", "trial", ConditionAction::Pay),
        ];
        assert!(payment_required(&headers(&[("X-Tier", "trial")]), &conditions));
    }

    /// No condition matching anything means payment is required.
    #[test]
    fn test_default_is_pay() {
        let conditions = vec![cond("X-Key", "^secret$", ConditionAction::Free)];
        assert!(payment_required(&headers(&[]), &conditions));
        assert!(payment_required(&headers(&[("X-Key", "wrong")]), &conditions));
    }
}
