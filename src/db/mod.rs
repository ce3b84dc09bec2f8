pub mod backfill;
pub mod cleanup;
pub mod rating;
pub mod vote;
