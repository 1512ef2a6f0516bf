//! Deriving differentials on products from differentials on the factors.
//!
//! If $d_r$ is known on subspaces $I_1$ and $I_2$ of the terms at `l1` and `l2`, with values
//! $A_1$ and $A_2$, then on $\mu(I_1 \otimes I_2)$ the Leibniz rule gives
//! $$ d_r \mu(I_1 \otimes I_2) = \mu(A_1 \otimes I_2) + (-1)^{|l_1|} \mu(I_1 \otimes A_2). $$
//! The derived partial definitions are added alongside whatever is already known about the
//! differential on the product, so that conflicts show up as inconsistencies.
use fp::matrix::{Matrix, PartialDefinition};

use crate::{Location, SpectralSequence, SseqError};

impl<L: Location> SpectralSequence<L> {
    /// Pairs `(inclusion, action)` describing what is known about the $d_r$ differential out of
    /// `location`. If the target has no term and lies in a zero range, the differential is known
    /// to vanish.
    fn factor_partials(&self, location: L, page: i32) -> Vec<(Matrix, Matrix)> {
        let size = self.size_at(location);
        let mut result: Vec<(Matrix, Matrix)> = self
            .find_diffl_with_source(location, page)
            .map(|d| {
                d.partial_definitions()
                    .iter()
                    .map(|partial| (partial.inclusion().clone(), partial.action().clone()))
                    .collect()
            })
            .unwrap_or_default();

        let target = location.follow_diffl(page);
        if size > 0 && self.find_term(target).is_none() && self.is_in_zero_ranges(target) {
            result.push((Matrix::identity(self.p, size), Matrix::new(self.p, 0, size)));
        }
        result
    }

    /// Derives partial definitions of $d_r$ on the term at `left + right` from the partial
    /// definitions at `left` and `right`. Nothing is derived if a product involved is unknown.
    ///
    /// # Returns
    /// The number of new partial definitions.
    pub fn compute_leibniz(&mut self, left: L, right: L, page: i32) -> Result<usize, SseqError> {
        let location = left + right;
        if [left, right, location]
            .iter()
            .any(|&l| self.find_term(l).is_none())
        {
            return Ok(0);
        }
        let left_end = left.follow_diffl(page);
        let right_end = right.follow_diffl(page);
        let end = location.follow_diffl(page);

        let (Some(mu), Some(mu_left_end), Some(mu_right_end)) = (
            self.product_matrix(left, right)?,
            self.product_matrix(left_end, right)?,
            self.product_matrix(left, right_end)?,
        ) else {
            return Ok(0);
        };

        let sign = self.p.minus_one_to_the_n(left.koszul_degree());
        let left_partials = self.factor_partials(left, page);
        let right_partials = self.factor_partials(right, page);

        let mut derived = Vec::new();
        for (i1, a1) in &left_partials {
            for (i2, a2) in &right_partials {
                let inclusion = mu.multiply(&i1.tensor(i2)?)?;
                if inclusion.is_zero() {
                    continue;
                }
                let action = mu_left_end
                    .multiply(&a1.tensor(i2)?)?
                    .sum(&mu_right_end.multiply(&i1.tensor(a2)?)?.scale(sign))?;
                derived.push(PartialDefinition::automatic(inclusion, action)?);
            }
        }

        let mut added = 0;
        for partial in derived {
            if self.insert_partial_differential(partial, location, end, page)? {
                added += 1;
            }
        }
        if added > 0 {
            tracing::debug!(%left, %right, page, added, "derived partial differentials");
            self.reset_pages();
        }
        Ok(added)
    }

    /// Applies the Leibniz rule to every factorization `location = l1 + l2` into two locations
    /// with terms, neither of which is the identity.
    pub fn naively_propagate_leibniz(&mut self, location: L, page: i32) -> Result<usize, SseqError> {
        let identity = L::identity();
        let factorizations: Vec<(L, L)> = self
            .terms
            .keys()
            .map(|&l1| (l1, location - l1))
            .filter(|&(l1, l2)| {
                l1 <= l2 && l1 != identity && l2 != identity && self.terms.contains_key(&l2)
            })
            .collect();

        let mut added = 0;
        for (l1, l2) in factorizations {
            added += self.compute_leibniz(l1, l2, page)?;
        }
        Ok(added)
    }

    /// Applies the Leibniz rule to the products of the classes at `locations` with every other
    /// class.
    #[tracing::instrument(skip(self, locations), fields(locations = locations.len()))]
    pub fn propagate_leibniz(&mut self, locations: &[L], page: i32) -> Result<usize, SseqError> {
        let identity = L::identity();
        let others: Vec<L> = self
            .terms
            .keys()
            .copied()
            .filter(|&l| l != identity)
            .collect();

        let mut added = 0;
        for &l1 in locations.iter().filter(|&&l| l != identity) {
            for &l2 in &others {
                added += self.compute_leibniz(l1, l2, page)?;
            }
        }
        Ok(added)
    }
}
