//! Lexical tie-breaking for the vector candidate pool.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tutor_core::types::Hit;

/// Token-set similarity in `0..=100`, insensitive to word order and repeats.
///
/// Both strings are lowercased and reduced to alphanumeric words. With `I`
/// the sorted shared words and `A`/`B` the sorted words unique to each side,
/// the score is the best indel ratio among `I` vs `I+A`, `I` vs `I+B` and
/// `I+A` vs `I+B`. Sharing every word of either side scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> f32 {
    let ta = word_set(a);
    let tb = word_set(b);
    if ta.is_empty() || tb.is_empty() { return 0.0; }

    let common: Vec<&str> = ta.intersection(&tb).map(String::as_str).collect();
    let only_a: Vec<&str> = ta.difference(&tb).map(String::as_str).collect();
    let only_b: Vec<&str> = tb.difference(&ta).map(String::as_str).collect();
    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) { return 100.0; }

    let sect = common.join(" ");
    let join = |rest: &[&str]| if sect.is_empty() { rest.join(" ") } else { format!("{sect} {}", rest.join(" ")) };
    let with_a = join(&only_a);
    let with_b = join(&only_b);
    ratio(&sect, &with_a).max(ratio(&sect, &with_b)).max(ratio(&with_a, &with_b))
}

fn word_set(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// `2 * LCS / (len(a) + len(b)) * 100`, over characters.
fn ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 { return 100.0; }
    if a.is_empty() || b.is_empty() { return 0.0; }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { cur[j].max(prev[j + 1]) };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    (2 * prev[b.len()]) as f32 / total as f32 * 100.0
}

/// Fill `lexical` against `query` and stably sort by cosine, then lexical,
/// both descending.
pub fn rerank(query: &str, hits: &mut [Hit]) {
    for hit in hits.iter_mut() { hit.lexical = token_set_ratio(query, &hit.text); }
    hits.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(b.lexical.partial_cmp(&a.lexical).unwrap_or(Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, score: f32) -> Hit { Hit { text: text.into(), source: "s".into(), ordinal: 0, score, lexical: 0.0 } }

    #[test]
    fn subset_scores_full() {
        assert_eq!(token_set_ratio("Plants need water", "water, plants and light: what plants NEED"), 100.0);
        assert_eq!(token_set_ratio("fuzzy wuzzy was a bear", "wuzzy fuzzy was a bear"), 100.0);
    }

    #[test]
    fn disjoint_and_empty() {
        assert_eq!(token_set_ratio("", "anything"), 0.0);
        assert_eq!(token_set_ratio("?!", "..."), 0.0);
        assert!(token_set_ratio("abc", "xyz") < 1.0);
    }

    #[test]
    fn partial_overlap_is_between() {
        let r = token_set_ratio("mitochondria energy cell", "cell membrane structure");
        assert!(r > 0.0 && r < 100.0, "{r}");
        assert!(token_set_ratio("light energy plants", "plants use light energy daily") > token_set_ratio("light energy plants", "rocks erode slowly"));
    }

    #[test]
    fn ratio_matches_indel_definition() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert!((ratio("abcd", "abce") - 75.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_leads_and_lexical_breaks_ties() {
        let mut hits = vec![hit("rocks and stones", 0.5), hit("plants need light", 0.5), hit("unrelated", 0.9)];
        rerank("plants light", &mut hits);
        let order: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(order, vec!["unrelated", "plants need light", "rocks and stones"]);
        assert_eq!(hits[1].lexical, 100.0);
    }
}
