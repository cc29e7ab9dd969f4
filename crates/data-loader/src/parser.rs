//! Parser for MovieLens data files.
//!
//! Two layouts are understood:
//! - CSV (ml-latest, ml-32m): `movieId,title,genres` and
//!   `userId,movieId,rating,timestamp`, with a header row and quoted titles
//! - `.dat` (ml-1m): `movieId::title::genres` and
//!   `userId::movieId::rating::timestamp`, Latin-1 encoded
//!
//! Ids are canonicalized into `RawId` here, once, so nothing downstream has
//! to retry lookups with other representations.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// On-disk layout of a data file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Dat,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("dat") => DataFormat::Dat,
            _ => DataFormat::Csv,
        }
    }
}

/// Stream a file line by line, passing each 1-based line number and text.
///
/// The `.dat` files use ISO-8859-1, where each byte maps directly to a
/// Unicode code point. CSV releases are UTF-8.
fn for_each_line<F>(path: &Path, format: DataFormat, mut visit: F) -> Result<()>
where
    F: FnMut(usize, &str) -> Result<()>,
{
    let reader = BufReader::new(File::open(path)?);
    let mut line = String::new();

    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes?;
        line.clear();
        match format {
            DataFormat::Dat => line.extend(bytes.iter().map(|&b| b as char)),
            DataFormat::Csv => line.push_str(&String::from_utf8_lossy(&bytes)),
        }
        visit(idx + 1, &line)?;
    }
    Ok(())
}

/// Split one CSV record, honouring double quotes and `""` escapes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn split_fields(line: &str, format: DataFormat) -> Vec<String> {
    match format {
        DataFormat::Csv => split_csv_line(line),
        DataFormat::Dat => line.split("::").map(|s| s.to_string()).collect(),
    }
}

/// CSV releases start with a header row naming the columns
fn is_header(fields: &[String], first_column: &str) -> bool {
    fields
        .first()
        .map(|f| f.trim().eq_ignore_ascii_case(first_column))
        .unwrap_or(false)
}

/// Position and name of the file being parsed, for error messages
struct LineContext<'a> {
    file: &'a str,
    line: usize,
}

impl LineContext<'_> {
    fn field<'f>(&self, fields: &'f [String], idx: usize, name: &str) -> Result<&'f str> {
        fields
            .get(idx)
            .map(|s| s.as_str())
            .ok_or_else(|| DataLoadError::ParseError {
                file: self.file.to_string(),
                line: self.line,
                reason: format!("Missing {}", name),
            })
    }

    fn error(&self, reason: String) -> DataLoadError {
        DataLoadError::ParseError {
            file: self.file.to_string(),
            line: self.line,
            reason,
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a catalog file
///
/// The title often includes year in parentheses: "Toy Story (1995)"
/// Genres are pipe-separated: "Animation|Children|Comedy"
pub fn parse_movies(path: &Path) -> Result<Vec<Movie>> {
    let format = DataFormat::from_path(path);
    let file = file_label(path);
    let mut movies = Vec::new();

    for_each_line(path, format, |line_no, line| {
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            return Ok(());
        }
        let ctx = LineContext { file: &file, line: line_no };
        let fields = split_fields(line_trimmed, format);
        if line_no == 1 && format == DataFormat::Csv && is_header(&fields, "movieId") {
            return Ok(());
        }

        let movie_id = ctx.field(&fields, 0, "movieId")?;
        let title = ctx.field(&fields, 1, "title")?;
        let genres_str = ctx.field(&fields, 2, "genres")?;

        if movie_id.trim().is_empty() {
            return Err(ctx.error("Empty movieId".to_string()));
        }

        movies.push(Movie {
            id: RawId::parse(movie_id),
            title: title.trim().to_string(),
            year: extract_year_from_title(title),
            genres: parse_genres(genres_str),
        });
        Ok(())
    })?;
    Ok(movies)
}

/// Parse a ratings file
///
/// The timestamp column is optional; rows without one get timestamp 0.
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    let format = DataFormat::from_path(path);
    let file = file_label(path);
    let mut ratings = Vec::new();

    for_each_line(path, format, |line_no, line| {
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            return Ok(());
        }
        let ctx = LineContext { file: &file, line: line_no };
        let fields = split_fields(line_trimmed, format);
        if line_no == 1 && format == DataFormat::Csv && is_header(&fields, "userId") {
            return Ok(());
        }

        let user_id = ctx.field(&fields, 0, "userId")?;
        let movie_id = ctx.field(&fields, 1, "movieId")?;
        let rating_value = ctx.field(&fields, 2, "rating")?;

        let rating: f64 = rating_value
            .trim()
            .parse()
            .map_err(|e| ctx.error(format!("Invalid rating: {}", e)))?;
        let timestamp = match fields.get(3).map(|s| s.trim()) {
            Some(ts) if !ts.is_empty() => ts
                .parse()
                .map_err(|e| ctx.error(format!("Invalid timestamp: {}", e)))?,
            _ => 0,
        };

        ratings.push(Rating {
            user_id: RawId::parse(user_id),
            movie_id: RawId::parse(movie_id),
            rating,
            timestamp,
        });
        Ok(())
    })?;
    Ok(ratings)
}

/// Extract year from movie title
///
/// Example: "Toy Story (1995)" -> Some(1995)
///          "Movie Title" -> None
fn extract_year_from_title(title: &str) -> Option<u16> {
    let title = title.trim();
    let start = title.rfind('(')?;
    let end = title.rfind(')')?;
    if start < end {
        if let Ok(year) = title[start + 1..end].trim().parse::<u16>() {
            return Some(year);
        }
    }
    None
}

/// Parse pipe-separated genres
///
/// Example: "Action|Adventure|Sci-Fi" -> vec![Genre::Action, Genre::Adventure, Genre::SciFi]
///          "(no genres listed)" -> vec![]
///
/// Labels outside the known genre set are logged and skipped.
pub fn parse_genres(s: &str) -> Vec<Genre> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == NO_GENRES_SENTINEL {
        return Vec::new();
    }
    let mut genres = Vec::new();
    for genre_str in trimmed.split('|') {
        match genre_str.parse::<Genre>() {
            Ok(genre) if !genres.contains(&genre) => genres.push(genre),
            Ok(_) => {}
            Err(_) => warn!(label = genre_str, "Skipping unknown genre"),
        }
    }
    genres
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year_from_title("Toy Story (1995)"), Some(1995));
        assert_eq!(extract_year_from_title("Babylon 5 (1994) "), Some(1994));
        assert_eq!(extract_year_from_title("Movie Title"), None);
    }

    #[test]
    fn test_parse_genres_sentinel() {
        assert!(parse_genres(NO_GENRES_SENTINEL).is_empty());
        assert_eq!(
            parse_genres("Action|Sci-Fi|IMAX"),
            vec![Genre::Action, Genre::SciFi, Genre::Imax]
        );
    }

    #[test]
    fn test_unknown_genre_is_skipped() {
        assert_eq!(parse_genres("Action|Polka|Drama"), vec![Genre::Action, Genre::Drama]);
        assert!(parse_genres("Polka").is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "movieId,title,genres").unwrap();
        writeln!(file, "1,Toy Story (1995),Animation|Anime").unwrap();
        writeln!(file, "2,Jumanji (1995),Adventure").unwrap();
        drop(file);

        let movies = parse_movies(&path).unwrap();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].genres, vec![Genre::Animation]);
    }

    #[test]
    fn test_split_csv_line_quoted_title() {
        let fields = split_csv_line(r#"11,"American President, The (1995)",Comedy|Drama|Romance"#);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "American President, The (1995)");

        let fields = split_csv_line(r#"5,"Say ""Hi"" (2001)",Comedy"#);
        assert_eq!(fields[1], r#"Say "Hi" (2001)"#);
    }

    #[test]
    fn test_parse_movies_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "movieId,title,genres").unwrap();
        writeln!(file, "1,Toy Story (1995),Adventure|Animation|Children|Comedy|Fantasy").unwrap();
        writeln!(file, r#"11,"American President, The (1995)",Comedy|Drama|Romance"#).unwrap();
        writeln!(file, "999,Unlabelled (2010),(no genres listed)").unwrap();
        drop(file);

        let movies = parse_movies(&path).unwrap();
        assert_eq!(movies.len(), 3);
        assert_eq!(movies[0].id, RawId::Int(1));
        assert_eq!(movies[0].genres.len(), 5);
        assert_eq!(movies[1].title, "American President, The (1995)");
        assert_eq!(movies[1].year, Some(1995));
        assert!(movies[2].genres.is_empty());
    }

    #[test]
    fn test_parse_ratings_dat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.dat");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "1::1193::5::978300760").unwrap();
        writeln!(file, "1::661::3").unwrap();
        drop(file);

        let ratings = parse_ratings(&path).unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].movie_id, RawId::Int(1193));
        assert_eq!(ratings[0].timestamp, 978300760);
        assert_eq!(ratings[1].rating, 3.0);
        assert_eq!(ratings[1].timestamp, 0);
    }

    #[test]
    fn test_parse_movies_dat_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.dat");
        let mut bytes = b"1::Toy Story (1995)::Animation|Children's|Comedy\r\n".to_vec();
        bytes.extend_from_slice(b"2::Cit\xe9 des enfants perdus (1995)::Sci-Fi");
        std::fs::write(&path, bytes).unwrap();

        let movies = parse_movies(&path).unwrap();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].genres, vec![Genre::Animation, Genre::Children, Genre::Comedy]);
        assert_eq!(movies[1].title, "Cité des enfants perdus (1995)");
        assert_eq!(movies[1].year, Some(1995));
    }

    #[test]
    fn test_parse_ratings_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "userId,movieId,rating,timestamp").unwrap();
        writeln!(file, "1,2,great,0").unwrap();
        drop(file);

        match parse_ratings(&path) {
            Err(DataLoadError::ParseError { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
