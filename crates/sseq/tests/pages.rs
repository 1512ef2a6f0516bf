use fp::{
    matrix::{arbitrary::MatrixArbParams, Matrix, PartialDefinition},
    prime::ValidPrime,
};
use proptest::prelude::*;
use sseq::{Pair, SpectralSequence, ZeroRange};

/// A spectral sequence with a $d_2$ and a $d_3$ into the same term, given by arbitrary matrices.
fn arb_sseq() -> impl Strategy<Value = SpectralSequence<Pair>> {
    (any::<ValidPrime>(), 1..4usize, 1..4usize, 1..4usize)
        .prop_flat_map(|(p, n2, n3, m)| {
            let matrix = |height: usize, width: usize| {
                Matrix::arbitrary_with(MatrixArbParams {
                    p: Some(p),
                    height: Just(height).boxed(),
                    width: Just(width).boxed(),
                })
            };
            (Just((p, n2, n3, m)), matrix(m, n2), matrix(m, n3))
        })
        .prop_map(|((p, n2, n3, m), d2, d3)| {
            let mut sseq = SpectralSequence::new(p);
            for i in 0..n2 {
                sseq.add_class(Pair(1, 1), &format!("a{i}")).unwrap();
            }
            for i in 0..n3 {
                sseq.add_class(Pair(1, 0), &format!("b{i}")).unwrap();
            }
            for i in 0..m {
                sseq.add_class(Pair(0, 3), &format!("c{i}")).unwrap();
            }
            sseq.add_partial_differential(PartialDefinition::full(d2), Pair(1, 1), Pair(0, 3), 2)
                .unwrap();
            sseq.add_partial_differential(PartialDefinition::full(d3), Pair(1, 0), Pair(0, 3), 3)
                .unwrap();
            sseq
        })
}

proptest! {
    #[test]
    fn pages_are_monotone(mut sseq in arb_sseq()) {
        sseq.advance_to_page(5).unwrap();
        for term in sseq.terms() {
            for page in 1..5 {
                prop_assert!(term.boundaries(page).image_contained_in(term.cycles(page)).unwrap());
                prop_assert!(term.cycles(page + 1).image_contained_in(term.cycles(page)).unwrap());
                prop_assert!(term
                    .boundaries(page)
                    .image_contained_in(term.boundaries(page + 1))
                    .unwrap());
                prop_assert!(term.dimension(page + 1).unwrap() <= term.dimension(page).unwrap());
            }
        }
    }

    #[test]
    fn ranks_match(mut sseq in arb_sseq()) {
        sseq.advance_to_page(4).unwrap();
        let d2 = sseq.find_diffl_with_source(Pair(1, 1), 2).unwrap().presentation().unwrap().clone();
        let d3 = sseq.find_diffl_with_source(Pair(1, 0), 3).unwrap().presentation().unwrap().clone();
        let n2 = d2.width();
        let n3 = d3.width();
        let m = d2.height();

        prop_assert_eq!(sseq.dimension_at(Pair(1, 1), 3).unwrap(), n2 - d2.rank());
        prop_assert_eq!(sseq.dimension_at(Pair(0, 3), 3).unwrap(), m - d2.rank());
        // d_3 only sees d_2 boundaries through the quotient
        let combined_rank = d2.direct_sum_common_target(&d3).unwrap().rank();
        prop_assert_eq!(sseq.dimension_at(Pair(1, 0), 4).unwrap(), n3 - (combined_rank - d2.rank()));
        prop_assert_eq!(sseq.dimension_at(Pair(0, 3), 4).unwrap(), m - combined_rank);
        prop_assert_eq!(
            Matrix::rank_of_map_into_quotient(&d3, &d2).unwrap(),
            combined_rank - d2.rank()
        );
    }
}

#[test]
fn missing_differentials_are_zero() {
    let p = ValidPrime::new(5);
    let mut sseq = SpectralSequence::new(p);
    sseq.add_class(Pair(1, 0), "x").unwrap();
    sseq.add_class(Pair(0, 2), "y").unwrap();
    sseq.set_zero_range(ZeroRange::Strict);
    sseq.advance_to_page(10).unwrap();
    assert_eq!(sseq.dimension_at(Pair(1, 0), 10).unwrap(), 1);
    assert_eq!(sseq.dimension_at(Pair(0, 2), 10).unwrap(), 1);
}

#[test]
fn partially_known_differential() {
    let p = ValidPrime::new(3);
    let mut sseq = SpectralSequence::new(p);
    sseq.add_class(Pair(1, 0), "x0").unwrap();
    sseq.add_class(Pair(1, 0), "x1").unwrap();
    sseq.add_class(Pair(0, 2), "y").unwrap();
    // d_2 is only known on x0 + x1
    sseq.add_partial_differential(
        PartialDefinition::new(
            Matrix::from_columns(p, 2, &[vec![1, 1]]),
            Matrix::from_vec(p, &[vec![2]]),
        )
        .unwrap(),
        Pair(1, 0),
        Pair(0, 2),
        2,
    )
    .unwrap();
    let d = sseq.find_diffl_with_source(Pair(1, 0), 2).unwrap();
    assert!(!d.well_defined().unwrap());
    assert!(!d.check_for_sanity().unwrap());
    // The unknown part is taken to be zero
    assert_eq!(d.presentation().unwrap().to_vec(), vec![vec![2, 0]]);

    sseq.advance_to_page(3).unwrap();
    assert_eq!(sseq.dimension_at(Pair(1, 0), 3).unwrap(), 1);
    assert_eq!(sseq.dimension_at(Pair(0, 2), 3).unwrap(), 0);
}
