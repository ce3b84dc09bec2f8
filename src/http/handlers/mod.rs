pub mod rating;

pub use rating::{record_vote_handler, show_rating_handler, top_rated_handler};
