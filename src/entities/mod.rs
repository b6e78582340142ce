pub mod comment;
pub mod film;
pub mod response_cache;
