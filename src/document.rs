use std::{fmt, fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sseq::{
    chart::{self, DifferentialSnapshot, GridRect, TermSnapshot},
    Location, Pair, SpectralSequence, SseqError, Triple,
};

/// A saved spectral sequence, tagged with its grading.
///
/// On disk this is `{"grading": "pair", "sseq": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "grading", content = "sseq", rename_all = "snake_case")]
pub enum Document {
    Pair(SpectralSequence<Pair>),
    Triple(SpectralSequence<Triple>),
}

macro_rules! dispatch {
    ($document:expr, $sseq:ident => $body:expr) => {
        match $document {
            Document::Pair($sseq) => $body,
            Document::Triple($sseq) => $body,
        }
    };
}

impl From<SpectralSequence<Pair>> for Document {
    fn from(sseq: SpectralSequence<Pair>) -> Self {
        Self::Pair(sseq)
    }
}

impl From<SpectralSequence<Triple>> for Document {
    fn from(sseq: SpectralSequence<Triple>) -> Self {
        Self::Triple(sseq)
    }
}

impl Document {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse spectral sequence in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn grading(&self) -> &'static str {
        match self {
            Self::Pair(_) => Pair::NAME,
            Self::Triple(_) => Triple::NAME,
        }
    }

    pub fn pages(&self) -> i32 {
        dispatch!(self, sseq => sseq.pages())
    }

    pub fn advance_to_page(&mut self, page: i32) -> Result<(), SseqError> {
        dispatch!(self, sseq => sseq.advance_to_page(page))
    }

    /// Applies the Leibniz rule to $d_r$ out of every location. Returns the number of partial
    /// differentials derived.
    pub fn propagate_leibniz(&mut self, page: i32) -> Result<usize, SseqError> {
        dispatch!(self, sseq => {
            let locations: Vec<_> = sseq.terms().map(|t| t.location()).collect();
            sseq.propagate_leibniz(&locations, page)
        })
    }

    pub fn summary(&self, page: i32) -> Result<PageSummary, SseqError> {
        dispatch!(self, sseq => {
            let mut summary = PageSummary {
                grading: self.grading(),
                page,
                locations: 0,
                classes: 0,
            };
            for term in sseq.terms() {
                let dimension = term.dimension(page)?;
                if dimension > 0 {
                    summary.locations += 1;
                    summary.classes += dimension;
                }
            }
            Ok(summary)
        })
    }

    /// The whole of $E_r$ as JSON, in the format of [`Chart`].
    pub fn chart(&self, page: i32) -> anyhow::Result<serde_json::Value> {
        Ok(dispatch!(self, sseq => serde_json::to_value(Chart::new(sseq, page)?)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub grading: &'static str,
    pub page: i32,
    pub locations: usize,
    pub classes: usize,
}

impl fmt::Display for PageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "E_{} ({} grading): {} classes in {} locations",
            self.page, self.grading, self.classes, self.locations
        )
    }
}

/// A page of a spectral sequence, with every class and every $d_r$ out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct Chart<L: Location> {
    pub page: i32,
    pub rect: GridRect,
    pub terms: Vec<TermSnapshot<L>>,
    pub differentials: Vec<DifferentialSnapshot<L>>,
}

impl<L: Location> Chart<L> {
    pub fn new(sseq: &SpectralSequence<L>, page: i32) -> Result<Self, SseqError> {
        let rect = bounding_rect(sseq);
        Ok(Self {
            page,
            rect,
            terms: chart::terms_at(sseq, page, rect)?,
            differentials: chart::differentials_at(sseq, page, rect)?,
        })
    }
}

fn bounding_rect<L: Location>(sseq: &SpectralSequence<L>) -> GridRect {
    let mut points = sseq.terms().map(|t| t.location().to_point());
    let Some((x, y)) = points.next() else {
        return GridRect::new(0, 0, 0, 0);
    };
    points.fold(GridRect::new(x, x, y, y), |rect, (x, y)| {
        GridRect::new(
            rect.left.min(x),
            rect.right.max(x),
            rect.bottom.min(y),
            rect.top.max(y),
        )
    })
}
