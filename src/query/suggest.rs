//! Nearest-name suggestions for unknown types, fields and views

/// Levenshtein edit distance between two strings, by character
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != *b_char);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

fn max_distance(length: usize) -> usize {
    (length / 2).clamp(1, 3)
}

/// Closest candidate within a length-dependent distance, ignoring case
pub fn closest<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let threshold = max_distance(name.chars().count());
    let lower = name.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let distance = edit_distance(&lower, &candidate.to_lowercase());
        if distance > threshold {
            continue;
        }
        match best {
            Some((_, d)) if d <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(s, _)| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("startTime", "startTime"), 0);
        assert_eq!(edit_distance("stratTime", "startTime"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("gcé", "gce"), 1);
    }

    #[test]
    fn test_closest() {
        let fields = ["startTime", "duration", "eventThread"];
        assert_eq!(closest("stratTime", fields), Some("startTime".to_string()));
        assert_eq!(closest("DURATION", fields), Some("duration".to_string()));
        assert_eq!(closest("zzzzzz", fields), None);
    }

    #[test]
    fn test_closest_prefers_first_of_equal_distance() {
        assert_eq!(closest("ab", ["ac", "ad"]), Some("ac".to_string()));
    }
}
