use data_loader::{DataIndex, RatingScale};
use std::path::Path;
use std::time::Instant;

fn main() {
    let data_dir = Path::new("datasets/ml-32m");

    println!("Loading catalog and ratings from {}...\n", data_dir.display());

    let start = Instant::now();
    let index = DataIndex::load_from_files(data_dir, RatingScale::default())
        .expect("Failed to load dataset");
    let elapsed = start.elapsed();

    let (movies, users, ratings) = index.counts();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Movies: {}", movies);
    println!("Users: {}", users);
    println!("Ratings: {}", ratings);
    println!("\nPerformance: {:.0} ratings/second",
             ratings as f64 / elapsed.as_secs_f64());
}
