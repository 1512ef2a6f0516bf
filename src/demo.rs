use fp::{
    matrix::{Matrix, PartialDefinition},
    prime::ValidPrime,
};
use sseq::{Pair, SpectralSequence, SseqError, ZeroRange};

/// $\mathbb{F}_p[x, y] / (x^2, y^{n + 1})$ with $x$ in $(1, 0)$, $y$ in $(0, 2)$ and
/// $d_2 x = y$. The differentials on the other monomials follow from the Leibniz rule, and only
/// $1$ and $x y^n$ survive to $E_3$.
pub fn truncated_polynomial(p: ValidPrime, n: u32) -> Result<SpectralSequence<Pair>, SseqError> {
    let mut sseq = SpectralSequence::polynomial(p);
    sseq.add_poly_class("x", Pair(1, 0), 1)?;
    sseq.add_poly_class("y", Pair(0, 2), n)?;
    sseq.set_zero_range(ZeroRange::left_of(0));
    sseq.add_partial_differential(
        PartialDefinition::full(Matrix::from_vec(p, &[vec![1]])),
        Pair(1, 0),
        Pair(0, 2),
        2,
    )?;
    let derived = sseq.propagate_leibniz(&[Pair(0, 2)], 2)?;
    tracing::debug!(derived, "built truncated polynomial");
    Ok(sseq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ends_survive() {
        for p in [2, 3, 5] {
            let mut sseq = truncated_polynomial(ValidPrime::new(p), 3).unwrap();
            sseq.advance_to_page(3).unwrap();
            let survivors: Vec<Pair> = sseq
                .terms()
                .map(|t| t.location())
                .filter(|&l| sseq.dimension_at(l, 3).unwrap() > 0)
                .collect();
            assert_eq!(survivors, vec![Pair(0, 0), Pair(1, 6)], "p = {p}");
        }
    }
}
