//! Exact linear algebra over the prime field $\mathbb{F}_p$.
//!
//! The [`matrix::Matrix`] type is a dense matrix acting on column vectors. Subspaces are
//! represented by matrices whose columns span them, which is the form every spectral sequence
//! computation in the `sseq` crate consumes.
#![allow(clippy::many_single_char_names)]
#![allow(clippy::unreadable_literal)]
#![deny(clippy::use_self)]

pub mod matrix;
pub mod prime;
