mod boundary;
mod dedup;
mod distance;
mod similarity;

pub use boundary::{load_boundary, within};
pub use dedup::{assign_rank_scores, merge, merge_contained};
pub use distance::{distance_miles, matches};
pub use similarity::rank_by_similarity;
