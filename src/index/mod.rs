mod filters;
mod tag_index;
mod tags;

pub use filters::FilterQuery;
pub use tag_index::TagIndex;
pub use tags::{ImageId, Tag};
