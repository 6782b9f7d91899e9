//! Episode status, release quality and the packed encoding that stores both.

mod status;
mod wanted;

pub use status::{PackedStatus, Quality, Status};
pub use wanted::{wanted_qualities, QualityProfile};
