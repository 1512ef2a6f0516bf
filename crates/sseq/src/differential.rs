use std::cell::OnceCell;

use fp::{
    matrix::{assemble_presentation, Assembly, Definedness, Matrix, MatrixError, PartialDefinition},
    prime::ValidPrime,
};
use serde::{Deserialize, Serialize};

use crate::{persist::Keyed, Location, SseqError};

/// A $d_r$ differential between two terms, known through a list of partial definitions.
///
/// The partial definitions are assembled into a presentation lazily, and the result is cached
/// until the next partial definition is added. Conflicting partial definitions are all kept, and
/// the differential reports itself as inconsistent until they are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Differential<L: Location> {
    start: L,
    end: L,
    page: i32,
    prime: ValidPrime,
    source_dimension: usize,
    target_dimension: usize,
    partial_definitions: Vec<PartialDefinition>,
    #[serde(skip)]
    assembly: OnceCell<Assembly>,
}

impl<L: Location> Keyed for Differential<L> {
    type Key = (L, i32);

    fn key(&self) -> (L, i32) {
        (self.start, self.page)
    }
}

impl<L: Location> Differential<L> {
    pub fn new(
        prime: ValidPrime,
        start: L,
        end: L,
        page: i32,
        source_dimension: usize,
        target_dimension: usize,
    ) -> Result<Self, SseqError> {
        if L::calculate_diffl_page(start, end) != Some(page) {
            return Err(SseqError::InvariantViolation {
                location: start.to_string(),
                reason: format!("there is no d_{page} differential from {start} to {end}"),
            });
        }
        Ok(Self {
            start,
            end,
            page,
            prime,
            source_dimension,
            target_dimension,
            partial_definitions: Vec::new(),
            assembly: OnceCell::new(),
        })
    }

    pub fn start(&self) -> L {
        self.start
    }

    pub fn end(&self) -> L {
        self.end
    }

    pub fn page(&self) -> i32 {
        self.page
    }

    pub fn prime(&self) -> ValidPrime {
        self.prime
    }

    pub fn source_dimension(&self) -> usize {
        self.source_dimension
    }

    pub fn target_dimension(&self) -> usize {
        self.target_dimension
    }

    pub fn partial_definitions(&self) -> &[PartialDefinition] {
        &self.partial_definitions
    }

    /// Records a partial definition.
    ///
    /// # Returns
    /// Whether the partial definition is new. If an identical one is already present, nothing is
    /// added, but an automatically generated copy is upgraded to a manual one.
    pub fn add_partial_definition(
        &mut self,
        partial: PartialDefinition,
    ) -> Result<bool, SseqError> {
        if partial.prime() != self.prime {
            return Err(MatrixError::PrimeMismatch(*self.prime, *partial.prime()).into());
        }
        if partial.source_dimension() != self.source_dimension
            || partial.target_dimension() != self.target_dimension
        {
            return Err(MatrixError::DimensionMismatch {
                op: "add_partial_definition",
                left: (self.target_dimension, self.source_dimension),
                right: (partial.target_dimension(), partial.source_dimension()),
            }
            .into());
        }
        if let Some(existing) = self.partial_definitions.iter_mut().find(|existing| {
            existing.inclusion() == partial.inclusion() && existing.action() == partial.action()
        }) {
            if !partial.automatically_generated() {
                existing.manually_generated();
            }
            return Ok(false);
        }
        self.partial_definitions.push(partial);
        self.assembly.take();
        Ok(true)
    }

    /// Assembles the partial definitions, reusing the cached result if there is one.
    pub fn assembly(&self) -> Result<&Assembly, SseqError> {
        if let Some(assembly) = self.assembly.get() {
            return Ok(assembly);
        }
        let assembly = assemble_presentation(
            self.prime,
            &self.partial_definitions,
            self.source_dimension,
            self.target_dimension,
        )?;
        if let Definedness::Inconsistent { conflicts } = &assembly.definedness {
            tracing::warn!(
                start = %self.start,
                page = self.page,
                ?conflicts,
                "inconsistent differential"
            );
        }
        Ok(self.assembly.get_or_init(|| assembly))
    }

    /// The `target_dimension x source_dimension` matrix of the differential. Where the partial
    /// definitions do not determine the differential, it is taken to be zero.
    pub fn presentation(&self) -> Result<&Matrix, SseqError> {
        let assembly = self.assembly()?;
        if assembly.is_inconsistent() {
            return Err(SseqError::Inconsistent {
                location: self.start.to_string(),
                page: self.page,
            });
        }
        Ok(&assembly.presentation)
    }

    pub fn definedness(&self) -> Result<&Definedness, SseqError> {
        Ok(&self.assembly()?.definedness)
    }

    /// Whether the partial definitions cover the source and agree with each other.
    pub fn well_defined(&self) -> Result<bool, SseqError> {
        Ok(self.assembly()?.is_well_defined())
    }

    /// Drops automatically generated partial definitions whose domain is already covered by the
    /// manually supplied ones, as well as repeated partial definitions.
    ///
    /// # Returns
    /// The number of partial definitions dropped.
    pub fn strip_duplicates(&mut self) -> Result<usize, SseqError> {
        let mut manual = Matrix::new(self.prime, self.source_dimension, 0);
        for partial in self
            .partial_definitions
            .iter()
            .filter(|p| !p.automatically_generated())
        {
            manual = manual.direct_sum_common_target(partial.inclusion())?;
        }

        let original = std::mem::take(&mut self.partial_definitions);
        let count = original.len();
        for partial in original {
            if self.partial_definitions.contains(&partial) {
                continue;
            }
            if partial.automatically_generated()
                && partial.inclusion().image_contained_in(&manual)?
            {
                continue;
            }
            self.partial_definitions.push(partial);
        }

        let dropped = count - self.partial_definitions.len();
        if dropped > 0 {
            self.assembly.take();
        }
        Ok(dropped)
    }

    /// Checks that the assembled presentation reproduces every partial definition and that the
    /// partial definitions cover the source.
    pub fn check_for_sanity(&self) -> Result<bool, SseqError> {
        let assembly = self.assembly()?;
        for partial in &self.partial_definitions {
            if assembly.presentation.multiply(partial.inclusion())? != *partial.action() {
                return Ok(false);
            }
        }
        Ok(!matches!(assembly.definedness, Definedness::Partial { .. }))
    }

    /// Pads the partial definitions after basis elements were appended to the source or target.
    pub(crate) fn resize(
        &mut self,
        source_dimension: usize,
        target_dimension: usize,
    ) -> Result<(), SseqError> {
        for partial in &mut self.partial_definitions {
            *partial = partial.pad(source_dimension, target_dimension)?;
        }
        self.source_dimension = source_dimension;
        self.target_dimension = target_dimension;
        self.assembly.take();
        Ok(())
    }
}
