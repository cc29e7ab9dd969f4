//! Core domain types for the catalog and the rating store.
//!
//! This module defines the fundamental data structures used throughout the system:
//! - `RawId`, the canonical form of every external identifier
//! - `Movie` and `Genre` for catalog entries
//! - `Rating` and `RatingScale` for user feedback
//! - `DataIndex`, the in-memory catalog + rating store

use crate::error::{DataLoadError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Identifiers
// =============================================================================

/// Canonical external identifier.
///
/// Raw ids reach us as native integers, strings ("42") and float-valued
/// integers ("42.0", `42.0`). They are normalized exactly once, where they
/// enter the system, so every downstream lookup is a single hash probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "RawIdRepr")]
pub enum RawId {
    Int(i64),
    Text(String),
}

/// Wire representations accepted when deserializing a `RawId`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<RawIdRepr> for RawId {
    fn from(repr: RawIdRepr) -> Self {
        match repr {
            RawIdRepr::Int(v) => RawId::Int(v),
            RawIdRepr::Float(v) => RawId::from(v),
            RawIdRepr::Text(s) => RawId::parse(&s),
        }
    }
}

impl RawId {
    /// Canonicalize a textual id.
    ///
    /// Example: "7" -> Int(7), " 7.0 " -> Int(7), "tt0114709" -> Text("tt0114709")
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return RawId::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            if let Some(id) = integral(v) {
                return id;
            }
        }
        RawId::Text(trimmed.to_string())
    }

    /// Returns the integer value when this id is numeric
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RawId::Int(v) => Some(*v),
            RawId::Text(_) => None,
        }
    }
}

/// Float values that hold an exact integer collapse to `RawId::Int`
fn integral(v: f64) -> Option<RawId> {
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(RawId::Int(v as i64))
    } else {
        None
    }
}

impl From<i64> for RawId {
    fn from(v: i64) -> Self {
        RawId::Int(v)
    }
}

impl From<u32> for RawId {
    fn from(v: u32) -> Self {
        RawId::Int(i64::from(v))
    }
}

impl From<f64> for RawId {
    fn from(v: f64) -> Self {
        integral(v).unwrap_or_else(|| RawId::Text(v.to_string()))
    }
}

impl From<&str> for RawId {
    fn from(s: &str) -> Self {
        RawId::parse(s)
    }
}

impl From<String> for RawId {
    fn from(s: String) -> Self {
        RawId::parse(&s)
    }
}

impl FromStr for RawId {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(RawId::parse(s))
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Int(v) => write!(f, "{}", v),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for RawId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RawId::Int(v) => serializer.serialize_i64(*v),
            RawId::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Identifier of a user in the rating store and in the trained model
pub type UserId = RawId;

/// Identifier of a catalog item
pub type MovieId = RawId;

// =============================================================================
// Movie-related Types
// =============================================================================

/// Genre annotation meaning "this movie has no genres"
pub const NO_GENRES_SENTINEL: &str = "(no genres listed)";

/// Represents a movie in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Year extracted from title (e.g., "Toy Story (1995)")
    pub year: Option<u16>,
    /// Empty when the catalog row carries the sentinel
    pub genres: Vec<Genre>,
}

/// Movie genres from MovieLens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    FilmNoir,
    Horror,
    Imax,
    Musical,
    Mystery,
    Romance,
    SciFi,
    Thriller,
    War,
    Western,
}

impl Genre {
    pub const ALL: [Genre; 19] = [
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Children,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Fantasy,
        Genre::FilmNoir,
        Genre::Horror,
        Genre::Imax,
        Genre::Musical,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    /// The label used in MovieLens genre strings
    pub fn label(&self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Children => "Children",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::FilmNoir => "Film-Noir",
            Genre::Horror => "Horror",
            Genre::Imax => "IMAX",
            Genre::Musical => "Musical",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::SciFi => "Sci-Fi",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Genre {
    type Err = DataLoadError;

    /// Example: "Action" -> Ok(Genre::Action), "sci-fi" -> Ok(Genre::SciFi)
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        // ML-1M spells it "Children's"
        if trimmed.eq_ignore_ascii_case("Children's") {
            return Ok(Genre::Children);
        }
        Genre::ALL
            .iter()
            .copied()
            .find(|g| g.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DataLoadError::InvalidValue {
                field: "genre".to_string(),
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Rating Types
// =============================================================================

/// Represents a single rating from a user for a movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub rating: f64,
    /// Unix timestamp when rating was made (0 when the source has none)
    pub timestamp: i64,
}

/// Closed interval every rating and every predicted score lives in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: f64,
    pub max: f64,
}

impl RatingScale {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let scale = Self { min, max };
        scale.validate()?;
        Ok(scale)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = self.min.is_finite() && self.max.is_finite();
        if !finite || self.min >= self.max || self.max <= 0.0 {
            return Err(DataLoadError::InvalidScale {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Clamp a prediction into the scale
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 0.5, max: 5.0 }
    }
}

// =============================================================================
// DataIndex - The In-Memory Catalog and Rating Store
// =============================================================================

/// Holds the catalog and every user's ratings.
///
/// Catalog order and per-user rating order are both preserved exactly as
/// loaded (or inserted). Fold-in results depend on rating order, and the
/// legacy scorer breaks ties by catalog position, so neither may come from
/// `HashMap` iteration.
#[derive(Debug)]
pub struct DataIndex {
    pub(crate) movies: HashMap<MovieId, Movie>,
    /// Catalog ids in load order
    pub(crate) movie_order: Vec<MovieId>,

    /// All ratings made by each user, oldest insert first
    pub(crate) user_ratings: HashMap<UserId, Vec<Rating>>,
    /// Index of each rated movie within `user_ratings[user]`
    rating_slots: HashMap<UserId, HashMap<MovieId, usize>>,
    /// Users in first-seen order
    pub(crate) user_order: Vec<UserId>,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self {
            movies: HashMap::new(),
            movie_order: Vec::new(),
            user_ratings: HashMap::new(),
            rating_slots: HashMap::new(),
            user_order: Vec::new(),
        }
    }

    /// Get a movie by ID
    pub fn get_movie(&self, id: &MovieId) -> Option<&Movie> {
        self.movies.get(id)
    }

    /// Get all ratings made by a user, in insertion order
    ///
    /// Returns an empty slice if user has no ratings
    pub fn get_user_ratings(&self, user_id: &UserId) -> &[Rating] {
        self.user_ratings
            .get(user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Catalog ids in load order
    pub fn all_movie_ids(&self) -> &[MovieId] {
        &self.movie_order
    }

    /// Users with at least one rating, in first-seen order
    pub fn user_ids(&self) -> &[UserId] {
        &self.user_order
    }

    /// Insert a movie; re-inserting an id replaces its metadata in place
    pub fn insert_movie(&mut self, movie: Movie) {
        if !self.movies.contains_key(&movie.id) {
            self.movie_order.push(movie.id.clone());
        }
        self.movies.insert(movie.id.clone(), movie);
    }

    /// Insert a rating, replacing any earlier rating of the same movie.
    ///
    /// A replaced rating moves to the end of the user's list, the same order
    /// an insert-or-replace into a rowid table produces.
    pub fn insert_rating(&mut self, rating: Rating) {
        if !self.user_ratings.contains_key(&rating.user_id) {
            self.user_order.push(rating.user_id.clone());
        }
        let ratings = self.user_ratings.entry(rating.user_id.clone()).or_default();
        let slots = self.rating_slots.entry(rating.user_id.clone()).or_default();

        if let Some(pos) = slots.remove(&rating.movie_id) {
            ratings.remove(pos);
            for (offset, later) in ratings[pos..].iter().enumerate() {
                slots.insert(later.movie_id.clone(), pos + offset);
            }
        }
        slots.insert(rating.movie_id.clone(), ratings.len());
        ratings.push(rating);
    }

    /// Get counts for debugging/validation: (movies, users, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.movies.len(), self.user_ratings.len(), total_ratings)
    }
}

impl Default for DataIndex {
    fn default() -> Self {
        Self::new()
    }
}
