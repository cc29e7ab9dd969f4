//! DataIndex building and indexing logic.
//!
//! This module builds the DataIndex from parsed data:
//! - Catalog and per-user rating indices
//! - Validation of ratings against the rating scale
//! - Catalog search

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Maximum number of entries an empty search returns
const DEFAULT_SEARCH_LIMIT: usize = 20;

impl DataIndex {
    /// Load a catalog and its ratings from a directory
    ///
    /// Steps:
    /// 1. Locate `movies.csv` (or `movies.dat`) and the optional ratings file
    /// 2. Parse both files in parallel
    /// 3. Index movies and ratings in load order
    /// 4. Validate ratings against `scale`
    pub fn load_from_files(data_dir: &Path, scale: RatingScale) -> Result<Self> {
        info!("Loading catalog from {:?}", data_dir);

        let movies_path = find_data_file(data_dir, "movies").ok_or_else(|| {
            DataLoadError::CatalogNotFound {
                dir: data_dir.to_path_buf(),
            }
        })?;
        let ratings_path = find_data_file(data_dir, "ratings");

        // Rayon's `join` runs both closures in parallel
        let (movies, ratings) = rayon::join(
            || parser::parse_movies(&movies_path),
            || match &ratings_path {
                Some(path) => parser::parse_ratings(path),
                None => Ok(Vec::new()),
            },
        );
        let movies = movies?;
        let ratings = ratings?;

        info!("Loaded {} movies, {} ratings", movies.len(), ratings.len());

        let mut index = DataIndex::new();
        for movie in movies {
            index.insert_movie(movie);
        }
        for rating in ratings {
            index.insert_rating(rating);
        }

        index.validate(scale)?;

        info!("DataIndex successfully built and validated");
        Ok(index)
    }

    /// Validate data integrity
    ///
    /// Ratings outside the scale are rejected. Ratings of movies the catalog
    /// does not know are kept (fold-in skips what it cannot resolve) but
    /// logged.
    pub fn validate(&self, scale: RatingScale) -> Result<()> {
        scale.validate()?;
        let mut unknown_movies = 0usize;
        for user_id in &self.user_order {
            for rating in self.get_user_ratings(user_id) {
                if !scale.contains(rating.rating) {
                    return Err(DataLoadError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.rating.to_string(),
                    });
                }
                if !self.movies.contains_key(&rating.movie_id) {
                    unknown_movies += 1;
                }
            }
        }
        if unknown_movies > 0 {
            warn!("{} ratings reference movies missing from the catalog", unknown_movies);
        }
        Ok(())
    }

    /// Case-insensitive substring search over titles and genre names
    ///
    /// An empty query returns the first entries of the catalog.
    pub fn search_movies(&self, query: &str) -> Vec<&Movie> {
        let catalog = self.movie_order.iter().filter_map(|id| self.movies.get(id));
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return catalog.take(DEFAULT_SEARCH_LIMIT).collect();
        }
        catalog
            .filter(|movie| {
                movie.title.to_lowercase().contains(&query)
                    || movie
                        .genres
                        .iter()
                        .any(|g| g.label().to_lowercase().contains(&query))
            })
            .collect()
    }
}

/// Find `<stem>.csv` or `<stem>.dat` in a directory, CSV first
fn find_data_file(data_dir: &Path, stem: &str) -> Option<PathBuf> {
    ["csv", "dat"]
        .iter()
        .map(|ext| data_dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_dataset(dir: &Path) {
        fs::write(
            dir.join("movies.csv"),
            "movieId,title,genres\n\
             1,Toy Story (1995),Adventure|Animation|Children|Comedy|Fantasy\n\
             2,Jumanji (1995),Adventure|Children|Fantasy\n\
             3,Grumpier Old Men (1995),Comedy|Romance\n",
        )
        .unwrap();
        fs::write(
            dir.join("ratings.csv"),
            "userId,movieId,rating,timestamp\n\
             1,1,4.0,964982703\n\
             1,3,4.5,964981247\n\
             2,2,3.0,964982224\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());

        let index = DataIndex::load_from_files(dir.path(), RatingScale::default()).unwrap();
        let (movies, users, ratings) = index.counts();
        assert_eq!(movies, 3);
        assert_eq!(users, 2);
        assert_eq!(ratings, 3);

        let order: Vec<_> = index.all_movie_ids().to_vec();
        assert_eq!(order, vec![RawId::Int(1), RawId::Int(2), RawId::Int(3)]);
        let jumanji = index.get_movie(&RawId::Int(2)).unwrap();
        assert_eq!(jumanji.genres, vec![Genre::Adventure, Genre::Children, Genre::Fantasy]);
        assert_eq!(index.user_ids(), &[RawId::Int(1), RawId::Int(2)]);
    }

    #[test]
    fn test_load_without_ratings_file() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        fs::remove_file(dir.path().join("ratings.csv")).unwrap();

        let index = DataIndex::load_from_files(dir.path(), RatingScale::default()).unwrap();
        assert_eq!(index.counts(), (3, 0, 0));
    }

    #[test]
    fn test_missing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let result = DataIndex::load_from_files(dir.path(), RatingScale::default());
        assert!(matches!(result, Err(DataLoadError::CatalogNotFound { .. })));
    }

    #[test]
    fn test_rating_out_of_scale_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        fs::write(dir.path().join("ratings.csv"), "1,1,9.0,0\n").unwrap();

        let result = DataIndex::load_from_files(dir.path(), RatingScale::default());
        assert!(matches!(result, Err(DataLoadError::InvalidValue { .. })));
    }

    #[test]
    fn test_search_movies() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let index = DataIndex::load_from_files(dir.path(), RatingScale::default()).unwrap();

        let hits = index.search_movies("toy");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, RawId::Int(1));

        let by_genre = index.search_movies("romance");
        assert_eq!(by_genre.len(), 1);

        assert_eq!(index.search_movies("").len(), 3);
    }
}
