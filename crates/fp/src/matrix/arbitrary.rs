use proptest::prelude::*;

use super::Matrix;
use crate::prime::ValidPrime;

pub const MAX_ROWS: usize = 8;
pub const MAX_COLUMNS: usize = 8;

#[derive(Debug, Clone)]
pub struct MatrixArbParams {
    pub p: Option<ValidPrime>,
    pub height: BoxedStrategy<usize>,
    pub width: BoxedStrategy<usize>,
}

impl Default for MatrixArbParams {
    fn default() -> Self {
        Self {
            p: None,
            height: (0..=MAX_ROWS).boxed(),
            width: (0..=MAX_COLUMNS).boxed(),
        }
    }
}

impl Arbitrary for Matrix {
    type Parameters = MatrixArbParams;
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        let p = match args.p {
            Some(p) => Just(p).boxed(),
            None => any::<ValidPrime>().boxed(),
        };

        (p, args.height, args.width)
            .prop_flat_map(|(p, height, width)| {
                let entries = proptest::collection::vec(0..*p, height * width);
                (Just(p), Just(height), Just(width), entries)
            })
            .prop_map(|(p, height, width, entries)| {
                let mut result = Self::new(p, height, width);
                for (idx, &c) in entries.iter().enumerate() {
                    result.set_entry(idx / width, idx % width, c);
                }
                result
            })
            .boxed()
    }
}
