//! Pure menu text handling: line normalization and menu date recovery.
//! Nothing in here touches the network or the filesystem.

pub mod date;
pub mod normalize;

pub use date::{extract, MenuDate};
pub use normalize::{contains_keyword, normalize};
