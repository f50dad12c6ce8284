//! "Did you mean?" suggestions based on Levenshtein edit distance.

/// Minimum number of single-character insertions, deletions or substitutions
/// turning `a` into `b`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];
    for (i, ac) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, bc) in b_chars.iter().enumerate() {
            let cost = usize::from(ac != *bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

// Short names tolerate fewer edits so unrelated names aren't offered.
fn threshold(name_len: usize) -> usize {
    match name_len {
        0 => 0,
        1..=2 => 1,
        3..=5 => 2,
        6..=10 => 3,
        n => (n / 2).min(5),
    }
}

/// Candidates within the distance threshold of `name`, best first.
/// Ties are broken alphabetically; exact matches and duplicates are skipped.
pub fn similar_names<I, S>(name: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let max = threshold(name.chars().count());
    let mut scored: Vec<(usize, String)> = candidates
        .into_iter()
        .filter_map(|c| {
            let c = c.as_ref();
            if c == name {
                return None;
            }
            let d = edit_distance(&name.to_lowercase(), &c.to_lowercase());
            (d <= max).then(|| (d, c.to_string()))
        })
        .collect();
    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(limit).map(|(_, c)| c).collect()
}

/// The single best suggestion, if any.
pub fn suggest_similar<I, S>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    similar_names(name, candidates, 1).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("lenght", "length"), 2);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn suggests_closest_within_threshold() {
        let names = ["length", "height", "width"];
        assert_eq!(suggest_similar("lenght", names), Some("length".to_string()));
        assert_eq!(suggest_similar("mathh", ["math", "string", "time"]), Some("math".to_string()));
        assert_eq!(suggest_similar("zzzzzz", names), None);
    }

    #[test]
    fn ordered_and_limited() {
        let got = similar_names("cat", ["bat", "cart", "cat", "dog", "car"], 2);
        assert_eq!(got, vec!["bat".to_string(), "car".to_string()]);
    }
}
