// ABOUTME: Integration tests for free-text pull spec detection.
// ABOUTME: Table of positive, negative and mixed-prose inputs, plus generated prose.

use manifest_pin::manifest::default_pullspec_heuristic;
use proptest::prelude::*;

const SHA: &str = "5d141ae1081640587636880dbe8489439353df883379158fa8742d5a3be75475";
const NOT_B16: &str = "5d141ae1081640587636880dbe8489439353df883379158fa8742d5a3be7547g";

fn found(text: &str) -> Vec<String> {
    let mut found: Vec<String> = default_pullspec_heuristic(text)
        .into_iter()
        .map(|span| text[span].to_string())
        .collect();
    found.sort();
    found
}

fn check(cases: &[(String, Vec<&str>)]) {
    for (text, expected) in cases {
        let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(found(text), expected, "input {text:?}");
    }
}

fn same(text: &str) -> (String, Vec<&str>) {
    (text.to_string(), vec![text])
}

fn none(text: &str) -> (String, Vec<&'static str>) {
    (text.to_string(), vec![])
}

#[test]
fn plain_references() {
    let digest = format!("a.b/c@sha256:{SHA}");
    let nested_digest = format!("a.b/c/d@sha256:{SHA}");
    let special = format!("a-b.c_d/e-f.g_h/i-j.k_l@sha256:{SHA}");

    check(&[
        same("a.b/c:1"),
        same("a.b/c/d:1"),
        same("registry.i/namespace/baz:latest"),
        (digest.clone(), vec![digest.as_str()]),
        (nested_digest.clone(), vec![nested_digest.as_str()]),
        same("a.b:1/c:1"),
        same("a.b:5000/c/d:1"),
        (special.clone(), vec![special.as_str()]),
        same("a-._b/c-._d/e-._f:g-._h"),
        same("1.2-3_4/5.6-7_8/9.0-1_2:3.4-5_6"),
        same("a.b/c/d/e:1"),
        same("a.b/c/d/e/f/g/h/i:1"),
    ]);
}

#[test]
fn enclosed_references() {
    let enclosures = [
        " ", "\n", "\t", ",", ";", "'", "\"", "`", "*", ".", "-", "_", "/", "@", ":", "...",
    ];
    let mut cases: Vec<(String, Vec<&str>)> = enclosures
        .iter()
        .map(|e| (format!("{e}a.b/c:1{e}"), vec!["a.b/c:1"]))
        .collect();
    for (open, close) in [("<", ">"), ("(", ")"), ("[", "]"), ("{", "}")] {
        cases.push((format!("{open}a.b/c:1{close}"), vec!["a.b/c:1"]));
    }
    check(&cases);
}

#[test]
fn trailing_separators_after_tags() {
    let digest = format!("a.b/c@sha256:{SHA}");
    check(&[
        ("a.b/c:latest:".to_string(), vec!["a.b/c:latest"]),
        (format!("{digest}:"), vec![digest.as_str()]),
        (format!("{digest}..."), vec![digest.as_str()]),
        ("a.b/c:v1.1...".to_string(), vec!["a.b/c:v1.1"]),
    ]);
}

#[test]
fn rejects_non_references() {
    let not_b16 = format!("a.b/c:@sha256:{NOT_B16}");
    let mut cases = vec![none(&not_b16)];
    cases.extend(
        [
            "", "!", ".", "!!!", "...",
            "a.bc:1",
            "ab/c:1",
            "a.b/c", "a.b/c:", "a.b/c:...",
            "a.b/c:@123", "a.b/c:@:123", "a.b/c:@sha256", "a.b/c:@sha256:",
            "a.b/c:@sha256:...", "a.b/c:@sha256:123456",
            "a.b//c:1", "https://a.b/c:1",
            "a@b.c/d:1", "a.b@c/d:1",
            "a.b/c@d/e:1", "a.b/c:d/e:1", "a.b/c/d@e/f:1", "a.b/c/d:e/f:1",
            "a:b.c/d:1", "a.b:c/d:1", "a.b:/c:1", "a.b:11ff/c:1",
            "a.b-/c:1", "a.b/-c:1", "a.b/c-:1", "a.b/c:-1",
            "a.b/-c/d:1", "a.b/c-/d:1", "a.b/c/-d:1", "a.b/c/d-:1", "a.b/c/d:-1",
        ]
        .into_iter()
        .map(none),
    );
    check(&cases);
}

#[test]
fn separated_references() {
    let separators = [
        " ", "\t", "\n", "\n\t ", ",", ";", ", ", "; ", " , ", " ; ",
        "/ ", " /", "- ", " -", ": ", " :", ". ", " .", "_ ", " _", "@ ", " @",
    ];
    let cases: Vec<(String, Vec<&str>)> = separators
        .iter()
        .map(|s| (format!("a.b/c:1{s}d.e/f:1"), vec!["a.b/c:1", "d.e/f:1"]))
        .collect();
    check(&cases);
}

#[test]
fn references_in_prose() {
    check(&[
        (
            "First is a.b/c:1. Second is d.e/f:1.".to_string(),
            vec!["a.b/c:1", "d.e/f:1"],
        ),
        (
            "My pullspecs are a.b/c:1 and d.e/f:1.".to_string(),
            vec!["a.b/c:1", "d.e/f:1"],
        ),
        (
            "There is/are some pullspec(s) in registry.io: a.b/c:1, d.e/f:1".to_string(),
            vec!["a.b/c:1", "d.e/f:1"],
        ),
        (
            r#"
     Find more info on https://my-site.com/here.
     Some pullspec are <i>a.b/c:1<i> and __d.e/f:1__.
     There is also g.h/i:latest: that one is cool.
     And you can email me at name@server.com for info
     about the last one: j.k/l:v1.1.
     "#
            .to_string(),
            vec!["a.b/c:1", "d.e/f:1", "g.h/i:latest", "j.k/l:v1.1"],
        ),
        (
            r#"
     I might also decide to do some math: 50.0/2 = 25.0.
     Perhaps even with variables: 0.5x/2 = x/4.
     And this one, 0.5/2:2 = 1/8, is a false positive.
     "#
            .to_string(),
            vec!["0.5/2:2"],
        ),
    ]);
}

#[test]
fn references_in_structured_text() {
    let three = vec!["a.b/c:1", "d.e/f:1", "g.h/i:1"];
    check(&[
        (r#"["a.b/c:1","d.e/f:1", "g.h/i:1"]"#.to_string(), three.clone()),
        (
            r#"{"a":"a.b/c:1","b": "d.e/f:1", "c": "g.h/i:1"}"#.to_string(),
            three.clone(),
        ),
        ("[a.b/c:1,d.e/f:1, g.h/i:1]".to_string(), three.clone()),
        ("{a: a.b/c:1,b: d.e/f:1, c: g.h/i:1}".to_string(), three.clone()),
        ("\na: a.b/c:1\nb: d.e/f:1\nc: g.h/i:1\n".to_string(), three),
    ]);
}

fn explicit_reference() -> impl Strategy<Value = String> {
    let registry = "[a-z]{1,6}\\.(io|com)";
    let path = proptest::collection::vec("[a-z0-9]{1,6}", 1..=3);
    let reference = prop_oneof![
        "[a-z0-9]{1,6}".prop_map(|tag| format!(":{tag}")),
        "[a-f0-9]{64}".prop_map(|hex| format!("@sha256:{hex}")),
    ];

    (registry, path, reference)
        .prop_map(|(registry, path, reference)| format!("{registry}/{}{reference}", path.join("/")))
}

fn in_candidate_class(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"/._@:-".contains(&byte)
}

proptest! {
    #[test]
    fn spans_are_ordered_disjoint_and_maximal(
        entries in proptest::collection::vec(
            (explicit_reference(), prop::sample::select(vec![" ", ", ", "; ", "\n", " and "])),
            1..6,
        ),
        lead in prop::sample::select(vec!["", "Image ", "(", "see: "]),
    ) {
        let mut text = lead.to_string();
        for (reference, separator) in &entries {
            text.push_str(reference);
            text.push_str(separator);
        }

        let spans = default_pullspec_heuristic(&text);
        let found: Vec<&str> = spans.iter().map(|span| &text[span.clone()]).collect();
        let expected: Vec<&str> = entries.iter().map(|(reference, _)| reference.as_str()).collect();
        prop_assert_eq!(found, expected);

        for pair in spans.windows(2) {
            prop_assert!(pair[0].end < pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
        }

        let bytes = text.as_bytes();
        for span in &spans {
            prop_assert!(span.start == 0 || !in_candidate_class(bytes[span.start - 1]));
            prop_assert!(span.end == bytes.len() || !in_candidate_class(bytes[span.end]));
        }
    }
}
