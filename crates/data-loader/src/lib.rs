//! # Data Loader Crate
//!
//! This crate loads the movie catalog and the users' ratings, and exposes
//! them to the scoring engine through the `Catalog` and `RatingStore` traits.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (RawId, Movie, Genre, Rating, RatingScale, DataIndex)
//! - **parser**: Parse MovieLens CSV and `.dat` files into Rust structs
//! - **index**: Build the in-memory index, validate it, search it
//! - **traits**: The read-only interfaces the engine consumes
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, RatingScale, RawId};
//! use std::path::Path;
//!
//! let index = DataIndex::load_from_files(Path::new("datasets/ml-32m"), RatingScale::default())?;
//!
//! let movie = index.get_movie(&RawId::Int(1)).unwrap();
//! let ratings = index.get_user_ratings(&RawId::Int(1));
//!
//! println!("{} has {} ratings from user 1", movie.title, ratings.len());
//! ```

// Public modules
pub mod error;
pub mod index;
pub mod parser;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use traits::{Catalog, RatingStore};
pub use types::{
    DataIndex,
    Genre,
    Movie,
    MovieId,
    // Identifiers
    RawId,
    Rating,
    RatingScale,
    UserId,
    NO_GENRES_SENTINEL,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, title: &str, genres: Vec<Genre>) -> Movie {
        Movie {
            id: RawId::Int(id),
            title: title.to_string(),
            year: None,
            genres,
        }
    }

    fn rating(user: i64, movie: i64, value: f64) -> Rating {
        Rating {
            user_id: RawId::Int(user),
            movie_id: RawId::Int(movie),
            rating: value,
            timestamp: 0,
        }
    }

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        assert_eq!(index.counts(), (0, 0, 0));
    }

    #[test]
    fn test_insert_movie_keeps_catalog_order() {
        let mut index = DataIndex::new();
        index.insert_movie(movie(3, "C", vec![]));
        index.insert_movie(movie(1, "A", vec![Genre::Drama]));
        index.insert_movie(movie(3, "C (restored)", vec![]));

        assert_eq!(index.all_movie_ids(), &[RawId::Int(3), RawId::Int(1)]);
        assert_eq!(index.get_movie(&RawId::Int(3)).unwrap().title, "C (restored)");
    }

    #[test]
    fn test_insert_rating_replaces_and_moves_to_end() {
        let mut index = DataIndex::new();
        index.insert_rating(rating(1, 10, 3.0));
        index.insert_rating(rating(1, 20, 4.0));
        index.insert_rating(rating(1, 10, 5.0));

        let ratings = index.get_user_ratings(&RawId::Int(1));
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].movie_id, RawId::Int(20));
        assert_eq!(ratings[1].movie_id, RawId::Int(10));
        assert_eq!(ratings[1].rating, 5.0);
    }

    #[test]
    fn test_empty_queries() {
        let index = DataIndex::new();

        assert!(index.get_movie(&RawId::Int(999)).is_none());
        assert!(index.get_user_ratings(&RawId::Int(999)).is_empty());
    }

    #[test]
    fn test_trait_objects_see_same_data() {
        let mut index = DataIndex::new();
        index.insert_movie(movie(1, "A", vec![Genre::Horror]));
        index.insert_rating(rating(7, 1, 4.5));

        let catalog: &dyn Catalog = &index;
        let store: &dyn RatingStore = &index;
        assert_eq!(catalog.all_item_ids().len(), 1);
        assert!(catalog.lookup(&RawId::parse("1.0")).is_some());
        assert_eq!(store.get_user_ratings(&RawId::Int(7)).len(), 1);
    }
}
