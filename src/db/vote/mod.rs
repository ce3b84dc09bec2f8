pub mod get;
pub mod post;

pub use get::get_vote;
pub use post::record_vote;
