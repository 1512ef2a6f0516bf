//! Spectral sequences whose $E_1$ page is a truncated polynomial algebra.
//!
//! The basis of every term is a list of monomials in named generators, recorded by
//! [`PolynomialTag`]s. Products are computed by adding exponents, so no multiplication table
//! needs to be filled in by hand. Monomials in which some exponent exceeds the bound of its
//! generator are zero.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter},
};

use fp::{matrix::Matrix, prime::ValidPrime};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{persist, Location, SpectralSequence, SseqError, Term};

/// A monomial, as a map from generator names to exponents. Zero exponents are never stored, so
/// the unit is the empty map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolynomialTag(BTreeMap<String, u32>);

impl PolynomialTag {
    pub fn unit() -> Self {
        Self::default()
    }

    pub fn power(name: &str, exponent: u32) -> Self {
        let mut result = Self::unit();
        if exponent > 0 {
            result.0.insert(name.to_owned(), exponent);
        }
        result
    }

    pub fn exponent(&self, name: &str) -> u32 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn is_unit(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, &e)| (name.as_str(), e))
    }

    /// The product of two monomials, ignoring signs and bounds.
    pub fn sum(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (name, e) in other.iter() {
            *result.0.entry(name.to_owned()).or_insert(0) += e;
        }
        result
    }

    fn rename(&mut self, old: &str, new: &str) {
        if let Some(e) = self.0.remove(old) {
            self.0.insert(new.to_owned(), e);
        }
    }
}

impl Display for PolynomialTag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_unit() {
            return write!(f, "1");
        }
        let factors = self.iter().map(|(name, e)| {
            if e == 1 {
                name.to_owned()
            } else {
                format!("{name}^{e}")
            }
        });
        write!(f, "{}", factors.format(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PolynomialGenerator<L: Location> {
    pub name: String,
    pub location: L,
    /// The largest exponent of the generator that is nonzero.
    pub upper_bound: u32,
}

/// The polynomial structure of a [`SpectralSequence`]. For every location with a term, the
/// basis of the term is the list of monomials recorded here, in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PolynomialBacking<L: Location> {
    generators: Vec<PolynomialGenerator<L>>,
    #[serde(with = "persist::pairs")]
    tags: BTreeMap<L, Vec<PolynomialTag>>,
}

impl<L: Location> Default for PolynomialBacking<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Location> PolynomialBacking<L> {
    /// The polynomial algebra on no generators, consisting of the unit alone.
    pub fn new() -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(L::identity(), vec![PolynomialTag::unit()]);
        Self {
            generators: Vec::new(),
            tags,
        }
    }

    pub fn generators(&self) -> &[PolynomialGenerator<L>] {
        &self.generators
    }

    pub fn generator(&self, name: &str) -> Option<&PolynomialGenerator<L>> {
        self.generators.iter().find(|g| g.name == name)
    }

    fn generator_index(&self, name: &str) -> Result<usize, SseqError> {
        self.generators
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| SseqError::UnknownGenerator(name.to_owned()))
    }

    pub fn tags_at(&self, location: L) -> &[PolynomialTag] {
        self.tags.get(&location).map_or(&[], Vec::as_slice)
    }

    pub fn locations(&self) -> impl Iterator<Item = L> + '_ {
        self.tags.keys().copied()
    }

    fn check_known(&self, tag: &PolynomialTag) -> Result<(), SseqError> {
        match tag.iter().find(|(name, _)| self.generator(name).is_none()) {
            Some((name, _)) => Err(SseqError::UnknownGenerator(name.to_owned())),
            None => Ok(()),
        }
    }

    pub fn compute_location_for_tag(&self, tag: &PolynomialTag) -> Result<L, SseqError> {
        self.check_known(tag)?;
        Ok(self
            .generators
            .iter()
            .fold(L::identity(), |acc, g| {
                acc + g.location.scale(tag.exponent(&g.name) as i32)
            }))
    }

    /// The parity of the sign picked up when reordering `left * right` into a monomial. The
    /// factors of `right` move past the factors of `left` belonging to later generators, which
    /// gives $\sum_{i > j} a_i b_j k_i k_j$ where $k_i$ is the Koszul degree of the `i`th
    /// generator.
    pub fn koszul_sign_for_multiplying(
        &self,
        left: &PolynomialTag,
        right: &PolynomialTag,
    ) -> Result<i32, SseqError> {
        self.check_known(left)?;
        self.check_known(right)?;
        let mut parity = 0;
        for (i, gi) in self.generators.iter().enumerate() {
            let a = left.exponent(&gi.name) as i32 * gi.location.koszul_degree();
            if a % 2 == 0 {
                continue;
            }
            for gj in &self.generators[..i] {
                parity += a * right.exponent(&gj.name) as i32 * gj.location.koszul_degree();
            }
        }
        Ok(parity.rem_euclid(2))
    }

    /// The product of two monomials, with the parity of its sign, or `None` if some exponent
    /// exceeds its bound.
    pub fn product_with_left_right(
        &self,
        left: &PolynomialTag,
        right: &PolynomialTag,
    ) -> Result<Option<(PolynomialTag, i32)>, SseqError> {
        let sign = self.koszul_sign_for_multiplying(left, right)?;
        let product = left.sum(right);
        let within_bounds = self
            .generators
            .iter()
            .all(|g| product.exponent(&g.name) <= g.upper_bound);
        Ok(within_bounds.then_some((product, sign)))
    }

    /// The matrix of the product `E(left) ⊗ E(right) -> E(left + right)`.
    pub fn product_matrix(&self, p: ValidPrime, left: L, right: L) -> Result<Matrix, SseqError> {
        let left_tags = self.tags_at(left);
        let right_tags = self.tags_at(right);
        let target_tags = self.tags_at(left + right);
        let index: FxHashMap<&PolynomialTag, usize> =
            target_tags.iter().enumerate().map(|(i, t)| (t, i)).collect();

        let mut result = Matrix::new(p, target_tags.len(), left_tags.len() * right_tags.len());
        for (i, a) in left_tags.iter().enumerate() {
            for (j, b) in right_tags.iter().enumerate() {
                let Some((product, sign)) = self.product_with_left_right(a, b)? else {
                    continue;
                };
                if let Some(&k) = index.get(&product) {
                    result.set_entry(k, i * right_tags.len() + j, p.minus_one_to_the_n(sign));
                }
            }
        }
        Ok(result)
    }

    /// Multiplies the monomials without the generator `g` by `g^e` for `e` in
    /// `old_bound + 1..=new_bound`, keeping those accepted by `condition`.
    ///
    /// # Returns
    /// The new monomials, in the order they were appended to their terms.
    fn grow(
        &mut self,
        g: usize,
        old_bound: u32,
        new_bound: u32,
        condition: &dyn Fn(&PolynomialTag, L) -> bool,
    ) -> Vec<(L, PolynomialTag)> {
        let generator = self.generators[g].clone();
        let base: Vec<(L, PolynomialTag)> = self
            .tags
            .iter()
            .flat_map(|(&l, tags)| tags.iter().map(move |t| (l, t.clone())))
            .filter(|(_, t)| t.exponent(&generator.name) == 0)
            .collect();

        let mut added = Vec::new();
        for (l, tag) in base {
            for e in old_bound + 1..=new_bound {
                let tag = tag.sum(&PolynomialTag::power(&generator.name, e));
                let location = l + generator.location.scale(e as i32);
                if condition(&tag, location) {
                    self.tags.entry(location).or_default().push(tag.clone());
                    added.push((location, tag));
                }
            }
        }
        self.generators[g].upper_bound = new_bound;
        added
    }

    /// Drops the monomials in which `name` has exponent above `new_bound`.
    ///
    /// # Returns
    /// The locations whose terms changed.
    fn shrink(&mut self, g: usize, new_bound: u32) -> BTreeSet<L> {
        let name = self.generators[g].name.clone();
        let mut affected = BTreeSet::new();
        for (&l, tags) in &mut self.tags {
            let before = tags.len();
            tags.retain(|t| t.exponent(&name) <= new_bound);
            if tags.len() != before {
                affected.insert(l);
            }
        }
        self.tags.retain(|_, tags| !tags.is_empty());
        self.generators[g].upper_bound = new_bound;
        affected
    }
}

impl<L: Location> SpectralSequence<L> {
    fn backing_mut(&mut self) -> Result<&mut PolynomialBacking<L>, SseqError> {
        self.polynomial.as_mut().ok_or(SseqError::NotPolynomial)
    }

    pub fn add_poly_class(&mut self, name: &str, location: L, up_to: u32) -> Result<(), SseqError> {
        self.add_poly_class_on_condition(name, location, up_to, |_, _| true)
    }

    /// Adds a polynomial generator, truncated above `up_to`. Only monomials accepted by
    /// `condition` are added to the terms, which can be used to skip regions of no interest.
    /// Monomials that were skipped are treated as zero in products.
    pub fn add_poly_class_on_condition(
        &mut self,
        name: &str,
        location: L,
        up_to: u32,
        condition: impl Fn(&PolynomialTag, L) -> bool,
    ) -> Result<(), SseqError> {
        let backing = self.backing_mut()?;
        if backing.generator(name).is_some() {
            return Err(SseqError::DuplicateGenerator(name.to_owned()));
        }
        backing.generators.push(PolynomialGenerator {
            name: name.to_owned(),
            location,
            upper_bound: 0,
        });
        let g = backing.generators.len() - 1;
        let added = backing.grow(g, 0, up_to, &condition);
        self.append_monomials(added)
    }

    pub fn resize_poly_class(&mut self, name: &str, up_to: u32) -> Result<(), SseqError> {
        self.resize_poly_class_on_condition(name, up_to, |_, _| true)
    }

    /// Changes the truncation of a generator. Growing appends monomials to the terms and keeps
    /// all known differentials and products. Shrinking rebuilds the terms that lost monomials and
    /// discards the differentials and products touching them.
    pub fn resize_poly_class_on_condition(
        &mut self,
        name: &str,
        up_to: u32,
        condition: impl Fn(&PolynomialTag, L) -> bool,
    ) -> Result<(), SseqError> {
        let backing = self.backing_mut()?;
        let g = backing.generator_index(name)?;
        let old_bound = backing.generators[g].upper_bound;
        if up_to > old_bound {
            let added = backing.grow(g, old_bound, up_to, &condition);
            self.append_monomials(added)
        } else if up_to < old_bound {
            let affected = backing.shrink(g, up_to);
            self.rebuild_polynomial_terms(affected)
        } else {
            Ok(())
        }
    }

    pub fn delete_class(&mut self, name: &str) -> Result<(), SseqError> {
        let backing = self.backing_mut()?;
        let g = backing.generator_index(name)?;
        let affected = backing.shrink(g, 0);
        backing.generators.remove(g);
        self.rebuild_polynomial_terms(affected)
    }

    pub fn change_name(&mut self, old: &str, new: &str) -> Result<(), SseqError> {
        let backing = self.backing_mut()?;
        let g = backing.generator_index(old)?;
        if backing.generator(new).is_some() {
            return Err(SseqError::DuplicateGenerator(new.to_owned()));
        }
        backing.generators[g].name = new.to_owned();
        let mut renamed = BTreeMap::new();
        for (&l, tags) in &mut backing.tags {
            if tags.iter().any(|t| t.exponent(old) > 0) {
                tags.iter_mut().for_each(|t| t.rename(old, new));
                renamed.insert(l, tags.iter().map(ToString::to_string).collect::<Vec<_>>());
            }
        }
        for (l, names) in renamed {
            if let Some(term) = self.terms.get_mut(&l) {
                term.set_names(names);
            }
        }
        Ok(())
    }

    fn append_monomials(&mut self, added: Vec<(L, PolynomialTag)>) -> Result<(), SseqError> {
        for (location, tag) in added {
            self.extend_term(location, tag.to_string())?;
        }
        Ok(())
    }

    fn rebuild_polynomial_terms(&mut self, affected: BTreeSet<L>) -> Result<(), SseqError> {
        let p = self.p;
        let mut dropped = 0;
        for &l in &affected {
            dropped += self.remove_structure_touching(l);
            let names: Vec<String> = self
                .polynomial
                .as_ref()
                .ok_or(SseqError::NotPolynomial)?
                .tags_at(l)
                .iter()
                .map(ToString::to_string)
                .collect();
            if names.is_empty() {
                self.terms.remove(&l);
            } else {
                self.terms.insert(l, Term::new(p, l, names));
            }
        }
        if dropped > 0 {
            tracing::warn!(
                dropped,
                terms = affected.len(),
                "discarded differentials and products on rebuilt terms"
            );
        }
        self.reset_pages();
        Ok(())
    }

    /// Records the products of the polynomial structure in the multiplication table and forgets
    /// the polynomial structure. This cannot be undone.
    pub fn upcast_to_sseq(mut self) -> Result<Self, SseqError> {
        let Some(backing) = self.polynomial.take() else {
            return Ok(self);
        };
        let locations: Vec<L> = self.terms.keys().copied().collect();
        for (i, &left) in locations.iter().enumerate() {
            for &right in &locations[i..] {
                if !self.terms.contains_key(&(left + right)) {
                    continue;
                }
                let matrix = backing.product_matrix(self.p, left, right)?;
                self.add_product_definition(fp::matrix::PartialDefinition::full(matrix), left, right)?;
            }
        }
        Ok(self)
    }
}
