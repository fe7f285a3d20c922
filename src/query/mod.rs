// Accumulators and the normalizer behind them
pub mod clause;
mod filter;
mod shape;
mod update;

pub use clause::{FilterOp, Fragment, LikeOptions, Pattern};
pub use filter::{Clause, FilterAccumulator};
pub use shape::{Order, Projection, QueryShape, Selection, SortSpec, normalize_directions};
pub use update::{Bucket, UpdateAccumulator, UpdateOp};
