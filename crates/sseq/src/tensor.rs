use std::collections::{BTreeMap, BTreeSet};

use fp::{
    matrix::{Matrix, MatrixError, PartialDefinition},
    prime::ValidPrime,
};

use crate::{multiplication::swap_factors, Location, SpectralSequence, SseqError, Term};

/// The summand $E(l_1) \otimes E(l_2)$ of the term at `l1 + l2` in a tensor product.
#[derive(Debug, Clone, Copy)]
struct Block<L> {
    location: L,
    offset: usize,
    left_size: usize,
    right_size: usize,
}

impl<L: Location> Block<L> {
    fn size(&self) -> usize {
        self.left_size * self.right_size
    }

    /// The inclusion of the block into the term of dimension `ambient`.
    fn inclusion(&self, p: ValidPrime, ambient: usize) -> Matrix {
        Matrix::evenly_spaced_inclusion(p, self.size(), ambient, self.offset, 1)
    }
}

/// The inclusion of `B ⊗ C` into `E(L) ⊗ E(M)`, where the blocks `B` and `C` sit in the terms
/// `E(L)` and `E(M)` of dimensions `ambient.0` and `ambient.1`.
fn block_pair_inclusion<L: Location>(
    p: ValidPrime,
    left: &Block<L>,
    right: &Block<L>,
    ambient: (usize, usize),
) -> Matrix {
    let mut result = Matrix::new(p, ambient.0 * ambient.1, left.size() * right.size());
    for a in 0..left.size() {
        for b in 0..right.size() {
            result.set_entry(
                (left.offset + a) * ambient.1 + right.offset + b,
                a * right.size() + b,
                1,
            );
        }
    }
    result
}

/// Pairs `(inclusion, action)` describing what is known about the $d_r$ differential out of
/// `location`. A differential into a location without classes, or into a zero range, is known to
/// vanish. Nothing is known about any other missing differential.
fn known_partials<L: Location>(
    sseq: &SpectralSequence<L>,
    location: L,
    page: i32,
) -> Vec<(Matrix, Matrix)> {
    let size = sseq.size_at(location);
    let mut result: Vec<(Matrix, Matrix)> = sseq
        .find_diffl_with_source(location, page)
        .map(|d| {
            d.partial_definitions()
                .iter()
                .map(|partial| (partial.inclusion().clone(), partial.action().clone()))
                .collect()
        })
        .unwrap_or_default();

    let target = location.follow_diffl(page);
    let target_size = sseq.size_at(target);
    if size > 0 && (target_size == 0 || sseq.is_in_zero_ranges(target)) {
        result.push((
            Matrix::identity(sseq.p, size),
            Matrix::new(sseq.p, target_size, size),
        ));
    }
    result
}

impl<L: Location> SpectralSequence<L> {
    /// The tensor product of two spectral sequences. The term at `l` is the direct sum of the
    /// blocks $E(l_1) \otimes E'(l_2)$ over `l1 + l2 = l`, ordered by `(l1, l2)`.
    ///
    /// Differentials are extended by $d(x \otimes y) = dx \otimes y + (-1)^{|x|} x \otimes dy$ and
    /// products by $(x \otimes y)(x' \otimes y') = (-1)^{|y||x'|} xx' \otimes yy'$. The
    /// differential on a block is only known where it is known on both factors, so a partially
    /// known or inconsistent factor gives a partially known or inconsistent product. Products that
    /// are not known on both factors are left unknown. Neither input is modified.
    #[tracing::instrument(skip_all, fields(left = self.terms.len(), right = other.terms.len()))]
    pub fn tensor_with_sseq(&self, other: &Self) -> Result<Self, SseqError> {
        if self.p != other.p {
            return Err(MatrixError::PrimeMismatch(*self.p, *other.p).into());
        }
        let p = self.p;
        let mut result = Self::new(p);

        let mut names: BTreeMap<L, Vec<String>> = BTreeMap::new();
        let mut blocks: BTreeMap<(L, L), Block<L>> = BTreeMap::new();
        for (&l1, t1) in &self.terms {
            for (&l2, t2) in &other.terms {
                let location = l1 + l2;
                let term_names = names.entry(location).or_default();
                blocks.insert(
                    (l1, l2),
                    Block {
                        location,
                        offset: term_names.len(),
                        left_size: t1.size(),
                        right_size: t2.size(),
                    },
                );
                for a in t1.names() {
                    for b in t2.names() {
                        term_names.push(format!("{a}⊗{b}"));
                    }
                }
            }
        }
        for (location, term_names) in names {
            result
                .terms
                .insert(location, Term::new(p, location, term_names));
        }

        self.tensor_differentials(other, &blocks, &mut result)?;
        self.tensor_products(other, &blocks, &mut result)?;

        if let (Some(u1), Some(u2)) = (self.multiplication.unit(), other.multiplication.unit()) {
            let identity = L::identity();
            if let Some(block) = blocks.get(&(identity, identity)) {
                result
                    .multiplication
                    .set_unit(Some(block.offset + u1 * block.right_size + u2));
            }
        }
        Ok(result)
    }

    fn tensor_differentials(
        &self,
        other: &Self,
        blocks: &BTreeMap<(L, L), Block<L>>,
        result: &mut Self,
    ) -> Result<(), SseqError> {
        let p = self.p;
        let pages: BTreeSet<i32> = self
            .differentials
            .keys()
            .chain(other.differentials.keys())
            .map(|&(_, page)| page)
            .collect();

        for (&(l1, l2), block) in blocks {
            let size = result.size_at(block.location);
            for &page in &pages {
                let end = block.location.follow_diffl(page);
                let end_size = result.size_at(end);
                if end_size == 0 {
                    continue;
                }
                let left_target = blocks.get(&(l1.follow_diffl(page), l2));
                let right_target = blocks.get(&(l1, l2.follow_diffl(page)));
                let sign = p.minus_one_to_the_n(l1.koszul_degree());

                let left_partials = known_partials(self, l1, page);
                let right_partials = known_partials(other, l2, page);
                for (i1, a1) in &left_partials {
                    for (i2, a2) in &right_partials {
                        let domain = i1.tensor(i2)?;
                        if domain.width() == 0 {
                            continue;
                        }
                        let mut action = Matrix::new(p, end_size, domain.width());
                        if let Some(target) = left_target {
                            let piece = a1.tensor(i2)?;
                            action = action.sum(&target.inclusion(p, end_size).multiply(&piece)?)?;
                        }
                        if let Some(target) = right_target {
                            let piece = i1.tensor(a2)?.scale(sign);
                            action = action.sum(&target.inclusion(p, end_size).multiply(&piece)?)?;
                        }
                        let inclusion = block.inclusion(p, size).multiply(&domain)?;
                        result.insert_partial_differential(
                            PartialDefinition::new(inclusion, action)?,
                            block.location,
                            end,
                            page,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn tensor_products(
        &self,
        other: &Self,
        blocks: &BTreeMap<(L, L), Block<L>>,
        result: &mut Self,
    ) -> Result<(), SseqError> {
        let p = self.p;
        let mut by_location: BTreeMap<L, Vec<(L, L)>> = BTreeMap::new();
        for (&key, block) in blocks {
            by_location.entry(block.location).or_default().push(key);
        }
        let locations: Vec<L> = by_location.keys().copied().collect();

        for (i, &left) in locations.iter().enumerate() {
            for &right in &locations[i..] {
                let target_size = result.size_at(left + right);
                if target_size == 0 {
                    continue;
                }
                let ambient = (result.size_at(left), result.size_at(right));
                for (l1, l2) in &by_location[&left] {
                    for (m1, m2) in &by_location[&right] {
                        let (Some(mu_left), Some(mu_right)) = (
                            self.product_matrix(*l1, *m1)?,
                            other.product_matrix(*l2, *m2)?,
                        ) else {
                            continue;
                        };
                        let b = &blocks[&(*l1, *l2)];
                        let c = &blocks[&(*m1, *m2)];

                        let action = match blocks.get(&(*l1 + *m1, *l2 + *m2)) {
                            Some(target) => {
                                let shuffle = Matrix::identity(p, b.left_size)
                                    .tensor(&swap_factors(p, b.right_size, c.left_size))?
                                    .tensor(&Matrix::identity(p, c.right_size))?;
                                let sign = p.minus_one_to_the_n(
                                    l2.koszul_degree() * m1.koszul_degree(),
                                );
                                target
                                    .inclusion(p, target_size)
                                    .multiply(&mu_left.tensor(&mu_right)?.multiply(&shuffle)?)?
                                    .scale(sign)
                            }
                            None => Matrix::new(p, target_size, b.size() * c.size()),
                        };
                        let inclusion = block_pair_inclusion(p, b, c, ambient);
                        result.add_product_definition(
                            PartialDefinition::new(inclusion, action)?,
                            left,
                            right,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}
