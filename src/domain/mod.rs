pub mod diff;
pub mod listing;

pub use diff::{diff_snapshot, sweep_removed, Change, Removal};
pub use listing::{format_price, Listing};
