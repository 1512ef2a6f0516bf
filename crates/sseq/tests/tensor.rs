use fp::{
    matrix::{Definedness, Matrix, PartialDefinition},
    prime::ValidPrime,
};
use sseq::{Pair, SpectralSequence, SseqError};

fn sseq(p: ValidPrime, classes: &[(Pair, &str)], d2: &[(Pair, Pair)]) -> SpectralSequence<Pair> {
    let mut sseq = SpectralSequence::new(p);
    for &(location, name) in classes {
        sseq.add_class(location, name).unwrap();
    }
    for &(source, target) in d2 {
        sseq.add_partial_differential(
            PartialDefinition::full(Matrix::from_vec(p, &[vec![1]])),
            source,
            target,
            2,
        )
        .unwrap();
    }
    sseq
}

#[test]
fn tensor_is_associative() {
    let p = ValidPrime::new(3);
    let a = sseq(
        p,
        &[(Pair(1, 0), "a"), (Pair(0, 2), "b"), (Pair(0, 1), "s")],
        &[(Pair(1, 0), Pair(0, 2))],
    );
    let b = sseq(
        p,
        &[(Pair(1, 0), "c"), (Pair(0, 2), "e"), (Pair(2, 0), "t")],
        &[(Pair(1, 0), Pair(0, 2))],
    );
    let c = sseq(p, &[(Pair(0, 1), "u"), (Pair(3, 1), "v")], &[]);

    let mut left = a.tensor_with_sseq(&b).unwrap().tensor_with_sseq(&c).unwrap();
    let mut right = a.tensor_with_sseq(&b.tensor_with_sseq(&c).unwrap()).unwrap();
    left.advance_to_page(3).unwrap();
    right.advance_to_page(3).unwrap();

    let locations: Vec<Pair> = left.terms().map(|t| t.location()).collect();
    assert_eq!(
        locations,
        right.terms().map(|t| t.location()).collect::<Vec<_>>()
    );
    for &location in &locations {
        for page in [1, 3] {
            assert_eq!(
                left.dimension_at(location, page).unwrap(),
                right.dimension_at(location, page).unwrap(),
                "E_{page} at {location}"
            );
        }
    }

    // E_3 is spanned by s ⊗ t ⊗ u and s ⊗ t ⊗ v
    let total: usize = locations
        .iter()
        .map(|&l| left.dimension_at(l, 3).unwrap())
        .sum();
    assert_eq!(total, 2);
    assert_eq!(left.dimension_at(Pair(2, 2), 3).unwrap(), 1);
    assert_eq!(left.dimension_at(Pair(5, 2), 3).unwrap(), 1);
}

#[test]
fn tensor_with_unit_is_trivial() {
    let p = ValidPrime::new(5);
    let a = sseq(
        p,
        &[(Pair(1, 0), "a"), (Pair(0, 2), "b"), (Pair(0, 0), "1")],
        &[(Pair(1, 0), Pair(0, 2))],
    );
    let unit = SpectralSequence::polynomial(p);

    let mut product = a.tensor_with_sseq(&unit).unwrap();
    assert_eq!(product.find_term(Pair(1, 0)).unwrap().names(), &["a⊗1"]);
    assert_eq!(
        product
            .find_diffl_with_source(Pair(1, 0), 2)
            .unwrap()
            .presentation()
            .unwrap()
            .to_vec(),
        vec![vec![1]]
    );
    product.advance_to_page(3).unwrap();
    assert_eq!(product.dimension_at(Pair(0, 0), 3).unwrap(), 1);
    assert_eq!(product.dimension_at(Pair(1, 0), 3).unwrap(), 0);
}

#[test]
fn partially_known_factor() {
    let p = ValidPrime::new(3);
    let mut left = sseq(p, &[(Pair(1, 0), "x0"), (Pair(1, 0), "x1"), (Pair(0, 2), "y")], &[]);
    left.add_partial_differential(
        PartialDefinition::new(
            Matrix::from_columns(p, 2, &[vec![1, 0]]),
            Matrix::from_vec(p, &[vec![1]]),
        )
        .unwrap(),
        Pair(1, 0),
        Pair(0, 2),
        2,
    )
    .unwrap();
    let right = sseq(p, &[(Pair(1, 0), "c"), (Pair(0, 2), "e")], &[(Pair(1, 0), Pair(0, 2))]);

    let mut product = left.tensor_with_sseq(&right).unwrap();
    // d(x0 ⊗ c) = y ⊗ c - x0 ⊗ e is known, but d(x1 ⊗ c) is not
    let d = product.find_diffl_with_source(Pair(2, 0), 2).unwrap();
    assert_eq!(d.definedness().unwrap(), &Definedness::Partial { missing: 1 });
    assert!(matches!(
        product.differential_matrix(Pair(2, 0), 2),
        Err(SseqError::UndefinedDifferential { .. })
    ));
    // On the known part the presentation is exact
    let x0_c = d.presentation().unwrap().column(0);
    assert_eq!(
        product.find_term(Pair(1, 2)).unwrap().names(),
        &["y⊗c", "x0⊗e", "x1⊗e"]
    );
    assert_eq!(x0_c, vec![1, 2, 0]);

    // Pages can still be computed, treating the unknown part as zero
    product.advance_to_page(3).unwrap();
}

#[test]
fn missing_factor_differential() {
    let p = ValidPrime::new(3);
    let right = sseq(p, &[(Pair(1, 0), "c"), (Pair(0, 2), "e")], &[(Pair(1, 0), Pair(0, 2))]);

    // d_2 x could hit y, and nothing says what it is
    let unknown = sseq(p, &[(Pair(1, 0), "x"), (Pair(0, 2), "y")], &[]);
    let product = unknown.tensor_with_sseq(&right).unwrap();
    assert!(product.find_diffl_with_source(Pair(2, 0), 2).is_none());
    assert!(matches!(
        product.differential_matrix(Pair(2, 0), 2),
        Err(SseqError::UndefinedDifferential { .. })
    ));
    // d(y ⊗ c) = y ⊗ e is determined, but d(x ⊗ e) is not
    assert_eq!(
        product
            .find_diffl_with_source(Pair(1, 2), 2)
            .unwrap()
            .definedness()
            .unwrap(),
        &Definedness::Partial { missing: 1 }
    );

    // Without a class in (0, 2), d_2 x = 0 is known
    let known = sseq(p, &[(Pair(1, 0), "x")], &[]);
    let product = known.tensor_with_sseq(&right).unwrap();
    assert_eq!(
        product.differential_matrix(Pair(2, 0), 2).unwrap().to_vec(),
        vec![vec![2]]
    );
}

#[test]
fn inconsistent_factor() {
    let p = ValidPrime::new(5);
    let mut left = sseq(p, &[(Pair(1, 0), "x"), (Pair(0, 2), "y")], &[(Pair(1, 0), Pair(0, 2))]);
    left.add_partial_differential(
        PartialDefinition::full(Matrix::from_vec(p, &[vec![3]])),
        Pair(1, 0),
        Pair(0, 2),
        2,
    )
    .unwrap();

    let mut product = left
        .tensor_with_sseq(&SpectralSequence::polynomial(p))
        .unwrap();
    let d = product.find_diffl_with_source(Pair(1, 0), 2).unwrap();
    assert!(matches!(
        d.definedness().unwrap(),
        Definedness::Inconsistent { .. }
    ));
    assert_eq!(
        product.advance_to_page(3),
        Err(SseqError::Inconsistent {
            location: "(1, 0)".to_owned(),
            page: 2
        })
    );
}
