pub mod get;
pub mod patch;
pub mod post;

pub use get::{get_or_create_rating, get_rating, list_top_rated};
pub use patch::update_rating;
pub use post::{create_rating, on_target_created};
