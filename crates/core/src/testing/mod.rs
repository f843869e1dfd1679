//! Scripted implementations of external dependencies for tests.

mod mock_movie_api;

pub use mock_movie_api::{test_movie, MockMovieApi};
