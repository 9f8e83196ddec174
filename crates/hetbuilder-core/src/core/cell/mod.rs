//! Cell-level transforms that produce new structures: integer supercells,
//! axis permutation and completion, and stacking-axis normalization.

pub mod axes;
pub mod normalize;
pub mod supercell;
