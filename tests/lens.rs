// ABOUTME: Integration tests for lens lookups over YAML trees.
// ABOUTME: Exercises key, index and apply steps plus their failure modes.

use manifest_pin::manifest::{Lens, LensError};
use serde_yaml::Value;

fn data() -> Value {
    serde_yaml::from_str(
        r#"
a: b
c:
  - d: 1
  - d: 2
"#,
    )
    .unwrap()
}

#[test]
fn lookup_through_mappings() {
    let data = data();

    let lens = Lens::builder().key("a").build();
    assert_eq!(lens.lookup(&data).unwrap().as_str(), Some("b"));

    let lens = Lens::builder().key("nothere").build();
    assert!(lens.lookup(&data).unwrap_err().is_not_found());

    let lens = Lens::builder().key("a").key("deadend").build();
    assert!(lens.lookup(&data).unwrap_err().is_not_found());
}

#[test]
fn lookup_through_sequences() {
    let data = data();

    let lens = Lens::builder().key("c").index(0).key("d").build();
    assert_eq!(lens.lookup(&data).unwrap().as_i64(), Some(1));

    for lens in [
        Lens::builder().key("c").index(2).key("d").build(),
        Lens::builder().key("c").index(-1).key("d").build(),
        Lens::builder().key("c").index(0).index(0).build(),
    ] {
        assert!(lens.lookup(&data).unwrap_err().is_not_found(), "{}", lens.path());
    }

    let lens = Lens::builder().key("a").build();
    assert!(matches!(
        lens.list(&data),
        Err(LensError::TypeMismatch { expected: "sequence", .. })
    ));
}

#[test]
fn apply_collects_from_each_element() {
    let data = data();

    let lens = Lens::builder()
        .key("c")
        .apply(Lens::builder().key("d").build())
        .build();
    let values: Vec<i64> = lens
        .list(&data)
        .unwrap()
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    assert_eq!(values, vec![1, 2]);

    let lens = Lens::builder()
        .key("c")
        .apply(Lens::builder().key("nothere").build())
        .build();
    assert!(lens.list(&data).unwrap().is_empty());

    let lens = Lens::builder()
        .key("a")
        .apply(Lens::builder().key("k").build())
        .build();
    assert!(lens.list(&data).unwrap_err().is_not_found());

    let lens = Lens::builder()
        .key("c")
        .apply(Lens::builder().key("d").index(0).build())
        .build();
    assert!(lens.list(&data).unwrap().is_empty());
    assert!(matches!(
        lens.map(&data),
        Err(LensError::TypeMismatch { expected: "mapping", .. })
    ));
}

#[test]
fn locate_reports_addresses() {
    let data: Value = serde_yaml::from_str(
        r#"
spec:
  deployments:
    - name: first
      containers:
        - image: a
        - image: b
    - name: second
    - name: third
      containers:
        - image: c
"#,
    )
    .unwrap();

    let lens = Lens::builder()
        .key("spec")
        .key("deployments")
        .apply(Lens::builder().key("containers").build())
        .apply(Lens::builder().key("image").build())
        .build();

    let located = lens.locate(&data).unwrap();
    let found: Vec<(String, &str)> = located
        .iter()
        .map(|l| (l.location.to_string(), l.value.as_str().unwrap()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("spec.deployments[0].containers[0].image".to_string(), "a"),
            ("spec.deployments[0].containers[1].image".to_string(), "b"),
            ("spec.deployments[2].containers[0].image".to_string(), "c"),
        ]
    );

    for l in &located {
        assert_eq!(l.location.resolve(&data), Some(l.value));
    }
}
