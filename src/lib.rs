//! Saved spectral sequences and the `ext-chart` command line tool.
//!
//! The algebra lives in the [`sseq`] crate. This crate adds a [`document::Document`] envelope
//! that records the grading of a saved spectral sequence, so that a file can be loaded without
//! knowing its grading in advance.
#![deny(clippy::use_self)]

pub mod demo;
pub mod document;
pub mod utils;
