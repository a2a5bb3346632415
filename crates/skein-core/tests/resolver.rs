use rstest::rstest;
use skein_core::domain::{DeclHeader, DeclKind};
use skein_core::{Declaration, Globals, InitError, ResolveError, initialize, resolve};

fn var(name: &str, refs: &[&str]) -> DeclHeader {
    DeclHeader::new(name, DeclKind::Variable, refs.iter().copied())
}

fn func(name: &str) -> DeclHeader {
    DeclHeader::new(name, DeclKind::Function, Vec::<String>::new())
}

fn chain() -> Vec<DeclHeader> {
    vec![
        var("w", &["z"]),
        var("x", &[]),
        var("y", &["x"]),
        var("d", &["c"]),
        var("b", &["a"]),
        var("z", &["y"]),
        var("a", &["w"]),
        var("g", &["f"]),
        var("f", &["e"]),
        var("c", &["b"]),
        var("e", &["d"]),
    ]
}

#[test]
fn resolution_is_deterministic_and_respects_dependencies() {
    let decls = chain();
    let first = resolve(&decls).unwrap();
    for _ in 0..20 {
        assert_eq!(resolve(&decls).unwrap(), first);
    }

    let names = first.names();
    assert_eq!(
        names,
        &["x", "y", "z", "w", "a", "b", "c", "d", "e", "f", "g"]
    );
    for decl in &decls {
        let at = names.iter().position(|n| n == decl.name()).unwrap();
        for dep in decl.references() {
            let dep_at = names.iter().position(|n| n == dep).unwrap();
            assert!(dep_at < at, "{dep} must come before {}", decl.name());
        }
    }
}

#[test]
fn unconstrained_declarations_keep_source_order() {
    let decls = vec![var("c", &[]), var("a", &[]), var("b", &["len"])];
    assert_eq!(resolve(&decls).unwrap().names(), &["c", "a", "b"]);
}

#[test]
fn functions_are_hoisted() {
    let decls = vec![var("x", &["f", "y"]), var("y", &["f"]), func("f")];
    assert_eq!(resolve(&decls).unwrap().names(), &["f", "y", "x"]);
}

#[rstest]
#[case::self_reference(vec![var("x", &["x"])], vec!["x", "x"])]
#[case::pair(vec![var("a", &["b"]), var("b", &["a"])], vec!["a", "b", "a"])]
#[case::behind_a_prefix(
    vec![var("ok", &[]), var("p", &["q"]), var("q", &["r"]), var("r", &["p"])],
    vec!["p", "q", "r", "p"]
)]
fn cycles_are_rejected(#[case] decls: Vec<DeclHeader>, #[case] members: Vec<&str>) {
    match resolve(&decls) {
        Err(ResolveError::Cycle { members: got }) => assert_eq!(got, members),
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn self_referencing_initializer_never_runs() {
    let decls: Vec<Declaration<i64>> = vec![Declaration::variable(
        "n",
        ["n"],
        |g: &Globals<i64>| -> Result<i64, InitError> { Ok(g.get("n")? + 1) },
    )];
    assert!(matches!(
        initialize(decls),
        Err(InitError::Resolve(ResolveError::Cycle { .. }))
    ));
}

#[test]
fn under_reported_reference_is_an_error_not_a_default() {
    // `b` reads `a` without declaring it, so `a` may not be ready yet.
    let decls: Vec<Declaration<i64>> = vec![
        Declaration::variable("b", Vec::<String>::new(), |g: &Globals<i64>| {
            Ok(g.get("a")? + 1)
        }),
        Declaration::variable("a", Vec::<String>::new(), |_: &Globals<i64>| Ok(1)),
    ];
    match initialize(decls) {
        Err(InitError::Uninitialized { name, requested_by }) => {
            assert_eq!(name, "a");
            assert_eq!(requested_by, "b");
        }
        other => panic!("expected Uninitialized, got {other:?}"),
    }
}
