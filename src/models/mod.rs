pub mod rating;
pub mod target;
pub mod vote;

pub use rating::Rating;
pub use target::{TargetRef, TargetRegistry, TargetSource};
pub use vote::{RatingEvent, Voter};
