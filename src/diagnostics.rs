//! Suggestion synthesis for [`crate::error::Error`] messages (spec §4.8).

/// Case-insensitive Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().flat_map(|c| c.to_lowercase()).collect();
    let b: Vec<char> = b.chars().flat_map(|c| c.to_lowercase()).collect();
    let (la, lb) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=lb).collect();
    let mut cur = vec![0usize; lb + 1];
    for i in 1..=la {
        cur[0] = i;
        for j in 1..=lb {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[lb]
}

/// Suggestion for a `key_not_found` error, following spec §4.8's rules:
/// distance 0 (case-only difference) gets its own phrasing, 1-2 gets a
/// single "Did you mean", 3+ lists up to 3 closest matches, and if nothing
/// is close enough but there are ≤5 keys, all of them are listed.
pub(crate) fn suggest_key(missing: &str, available: Option<&[String]>) -> Option<String> {
    let available = available?;
    if available.is_empty() {
        return None;
    }
    let threshold = (missing.len() / 2).max(3);

    let mut scored: Vec<(usize, &String)> = available
        .iter()
        .map(|k| (levenshtein(missing, k), k))
        .collect();
    scored.sort_by_key(|&(d, _)| d);

    let (best_dist, best_key) = scored[0];
    if best_dist == 0 && !missing.eq(best_key.as_str()) {
        return Some(format!("Did you mean '{}'? (case differs)", best_key));
    }
    if (1..=2).contains(&best_dist) {
        return Some(format!("Did you mean '{}'?", best_key));
    }
    if best_dist <= threshold {
        let candidates: Vec<&str> = scored
            .iter()
            .take(3)
            .map(|(_, k)| k.as_str())
            .collect();
        return Some(format!(
            "Did you mean one of: {}?",
            candidates.join(", ")
        ));
    }
    if available.len() <= 5 {
        let all: Vec<&str> = available.iter().map(String::as_str).collect();
        return Some(format!("Available keys are: {}", all.join(", ")));
    }
    None
}

const BOOL_WORDS: &[&str] = &[
    "true", "false", "yes", "no", "oui", "non", "ja", "nein", "да", "нет", "是", "否",
];

/// Pattern-driven hint for a `type_mismatch` error.
pub(crate) fn suggest_type_mismatch(expected: &str, actual: &str) -> Option<String> {
    let lower = actual.to_lowercase();
    if expected.contains("integer") || expected.contains("float") || expected.contains("number") {
        if actual.contains(',') || actual.contains('.') {
            return Some(
                "the value contains a grouping or decimal separator; try numberDecodingStrategy = flexible or locale(...)"
                    .to_string(),
            );
        }
        if actual.chars().any(|c| "$€£¥₹".contains(c)) {
            return Some(
                "the value looks like a currency amount; try numberDecodingStrategy = currency(...)".to_string(),
            );
        }
        if actual.chars().all(|c| c.is_ascii_digit()) && actual.len() >= 10 {
            return Some("the value looks like a Unix timestamp; this field may need a date strategy instead".to_string());
        }
    }
    if expected.contains("bool") && BOOL_WORDS.iter().any(|w| lower.contains(w)) {
        return Some("the value looks boolean-like; try boolDecodingStrategy = flexible".to_string());
    }
    if expected.contains("date") {
        if actual.contains('/') || actual.contains('-') || actual.contains('.') {
            return Some("the value looks like a date with a separator; try dateDecodingStrategy = flexible".to_string());
        }
        if actual.chars().all(|c| c.is_ascii_digit()) {
            return Some(
                "the value looks numeric; try dateDecodingStrategy = secondsSince1970 or msSince1970".to_string(),
            );
        }
    }
    None
}

/// Hint for a `parsing_error` message.
pub(crate) fn suggest_parsing_error(message: &str) -> Option<String> {
    if message.contains("unterminated") || message.contains("quote") {
        return Some("check for an unescaped or unterminated quote in the field".to_string());
    }
    if message.contains("expected") && message.contains("found") {
        return Some("check the delimiter and field count configured for this dialect".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_only_difference() {
        let keys = vec!["Naem".to_string(), "age".to_string()];
        let suggestion = suggest_key("naem", Some(&keys)).unwrap();
        assert!(suggestion.contains("case differs"));
    }

    #[test]
    fn distance_one_suggestion() {
        let keys = vec!["Naem".to_string(), "age".to_string()];
        let suggestion = suggest_key("name", Some(&keys)).unwrap();
        assert_eq!(suggestion, "Did you mean 'Naem'?");
    }

    #[test]
    fn far_match_lists_all_when_few_keys() {
        let keys = vec!["zzz".to_string(), "age".to_string()];
        let suggestion = suggest_key("name", Some(&keys)).unwrap();
        assert!(suggestion.starts_with("Available keys are:"));
    }

    #[test]
    fn levenshtein_basic() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("name", "name"), 0);
    }
}
