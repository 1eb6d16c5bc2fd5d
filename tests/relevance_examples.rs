// tests/relevance_examples.rs
//
// Relevance gate and dedup behaviour on hand-picked posts.

mod common;

use chrono::Utc;
use common::item;
use reddit_responder::relevance::{evaluate, is_relevant, match_keywords, KeywordSet};
use reddit_responder::seen::SeenSet;

#[test]
fn fresh_post_with_two_keywords_is_relevant() {
    let it = item("abc", "india", "need help with advice", "", 300, 5);
    let kw = KeywordSet::new(["help", "advice"]);
    let r = evaluate(&it, &kw, 3600, Utc::now());
    assert!(r.relevant);
    assert_eq!(r.matched, vec!["help".to_string(), "advice".to_string()]);
}

#[test]
fn same_post_two_hours_old_is_stale() {
    let it = item("abc", "india", "need help with advice", "", 7200, 5);
    let kw = KeywordSet::new(["help", "advice"]);
    assert!(!is_relevant(&it, &kw, 3600, Utc::now()));
}

#[test]
fn keyword_match_is_case_insensitive_substring_over_title_and_body() {
    let kw = KeywordSet::new(["Help", "how to"]);
    let it = item("x", "india", "Unhelpful landlord", "HOW TO deal with this?", 10, 0);
    assert_eq!(
        match_keywords(&it, &kw),
        vec!["Help".to_string(), "how to".to_string()]
    );
}

#[test]
fn downvoted_posts_never_pass() {
    let kw = KeywordSet::new(["help"]);
    let it = item("x", "india", "help", "", 10, -1);
    assert!(!is_relevant(&it, &kw, 3600, Utc::now()));
    let it = item("y", "india", "help", "", 10, 0);
    assert!(is_relevant(&it, &kw, 3600, Utc::now()));
}

#[test]
fn no_keyword_means_not_relevant_even_when_fresh() {
    let kw = KeywordSet::new(["help"]);
    let it = item("x", "india", "Sunset over Goa", "beautiful", 1, 100);
    let r = evaluate(&it, &kw, 3600, Utc::now());
    assert!(!r.relevant);
    assert!(r.matched.is_empty());
}

#[test]
fn relevant_items_always_satisfy_age_and_keyword_bounds() {
    let kw = KeywordSet::new(["stuck", "question"]);
    let now = Utc::now();
    let titles = ["I am stuck", "Quick QUESTION", "nothing here", "stuckness"];
    for (i, title) in titles.iter().enumerate() {
        for age in [0_i64, 1_800, 3_600, 3_601, 86_400] {
            let it = item(&format!("{i}-{age}"), "c", title, "", age, 1);
            let r = evaluate(&it, &kw, 3600, now);
            if r.relevant {
                assert!(now.signed_duration_since(it.created_at).num_seconds() <= 3600);
                assert!(!r.matched.is_empty());
            }
        }
    }
}

#[test]
fn seen_set_admits_each_id_once() {
    let seen = SeenSet::new();
    let ids = ["a", "b", "a", "c", "b", "a"];
    let admitted: Vec<&str> = ids.iter().copied().filter(|id| seen.mark_if_new(id)).collect();
    assert_eq!(admitted, vec!["a", "b", "c"]);
    assert_eq!(seen.len(), 3);
}
