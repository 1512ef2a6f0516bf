use expect_test::expect;
use ext_chart::{demo::truncated_polynomial, document::Document};
use fp::{
    matrix::{Matrix, PartialDefinition},
    prime::ValidPrime,
};
use sseq::{Pair, SpectralSequence, Triple, ZeroRange};

#[test]
fn envelope() {
    let document = Document::from(truncated_polynomial(ValidPrime::new(2), 2).unwrap());
    let value = serde_json::to_value(&document).unwrap();
    assert_eq!(value["grading"], "pair");
    assert!(value["sseq"].is_object());

    let mut sseq = SpectralSequence::new(ValidPrime::new(3));
    sseq.add_class(Triple(0, 1, 2), "t").unwrap();
    let document = Document::from(sseq);
    assert_eq!(document.grading(), "triple");
    assert_eq!(serde_json::to_value(&document).unwrap()["grading"], "triple");
}

#[test]
fn unknown_grading() {
    let json = r#"{"grading": "quadruple", "sseq": {}}"#;
    assert!(serde_json::from_str::<Document>(json).is_err());
}

#[test]
fn save_and_load() {
    let mut document = Document::from(truncated_polynomial(ValidPrime::new(3), 2).unwrap());
    document.advance_to_page(3).unwrap();

    let path = std::env::temp_dir().join(format!("ext-chart-{}.json", std::process::id()));
    document.save(&path).unwrap();
    let mut loaded = Document::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(
        serde_json::to_string(&loaded).unwrap(),
        serde_json::to_string(&document).unwrap()
    );
    loaded.advance_to_page(3).unwrap();
    assert_eq!(loaded.summary(3).unwrap(), document.summary(3).unwrap());
}

#[test]
fn load_missing_file() {
    let path = std::env::temp_dir().join("ext-chart-does-not-exist.json");
    let err = Document::load(&path).unwrap_err();
    assert!(err.to_string().starts_with("Failed to read"));
}

#[test]
fn summary() {
    let mut document = Document::from(truncated_polynomial(ValidPrime::new(2), 2).unwrap());
    document.advance_to_page(3).unwrap();
    expect!["E_1 (pair grading): 6 classes in 6 locations"]
        .assert_eq(&document.summary(1).unwrap().to_string());
    expect!["E_3 (pair grading): 2 classes in 2 locations"]
        .assert_eq(&document.summary(3).unwrap().to_string());
}

#[test]
fn chart() {
    let mut document = Document::from(truncated_polynomial(ValidPrime::new(2), 1).unwrap());
    document.advance_to_page(3).unwrap();
    expect![[r#"{"differentials":[],"page":3,"rect":{"bottom":0,"left":0,"right":1,"top":2},"terms":[{"labels":["1"],"location":[0,0],"rank":1},{"labels":["x y"],"location":[1,2],"rank":1}]}"#]]
        .assert_eq(&document.chart(3).unwrap().to_string());
}

#[test]
fn leibniz_on_document() {
    let p = ValidPrime::new(2);
    let mut sseq = SpectralSequence::polynomial(p);
    sseq.add_poly_class("x", Pair(1, 0), 1).unwrap();
    sseq.add_poly_class("y", Pair(0, 2), 3).unwrap();
    sseq.set_zero_range(ZeroRange::left_of(0));
    sseq.add_partial_differential(
        PartialDefinition::full(Matrix::from_vec(p, &[vec![1]])),
        Pair(1, 0),
        Pair(0, 2),
        2,
    )
    .unwrap();

    let mut document = Document::from(sseq);
    assert!(document.propagate_leibniz(2).unwrap() > 0);
    document.advance_to_page(3).unwrap();
    assert_eq!(document.summary(3).unwrap().classes, 2);
}
