// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fresh_repo_yields_alpha_first() {
    let gen = NameGenerator::new();
    let names = gen.next_available(std::iter::empty(), 1);
    assert_eq!(names, vec!["alpha".to_string()]);
}

#[test]
fn skips_used_single_symbols() {
    let gen = NameGenerator::new();
    let names = gen.next_available(["alpha", "bravo"], 1);
    assert_eq!(names, vec!["charlie".to_string()]);
}

#[test]
fn exhausting_depth_one_grows_to_compound_names() {
    let gen = NameGenerator::new();
    let used: Vec<&str> = vec![
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
        "juliett", "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo",
        "sierra", "tango", "uniform", "victor", "whiskey", "xray", "yankee", "zulu",
    ];
    let names = gen.next_available(used, 3);
    assert_eq!(
        names,
        vec![
            "alpha-alpha".to_string(),
            "alpha-bravo".to_string(),
            "alpha-charlie".to_string(),
        ]
    );
}

#[test]
fn depth_of_single_symbol_is_one() {
    assert_eq!(NameGenerator::depth("alpha"), 1);
}

#[test]
fn depth_of_compound_is_two() {
    assert_eq!(NameGenerator::depth("alpha-alpha"), 2);
}

#[test]
fn zulu_sorts_before_compound_names() {
    assert_eq!(
        NameGenerator::compare("zulu", "alpha-alpha"),
        std::cmp::Ordering::Less
    );
}

#[test]
fn within_depth_sorts_lexicographically() {
    assert_eq!(
        NameGenerator::compare("alpha", "zulu"),
        std::cmp::Ordering::Less
    );
}

#[test]
fn generated_names_are_distinct_from_used_and_each_other() {
    let gen = NameGenerator::new();
    let used = ["alpha", "gamma-does-not-exist"];
    let names = gen.next_available(used, 10);
    let mut seen = std::collections::HashSet::new();
    for name in &names {
        assert!(!used.contains(&name.as_str()));
        assert!(seen.insert(name.clone()), "duplicate name: {name}");
    }
    assert_eq!(names.len(), 10);
}
