//! Smoke test for the batch loader: pull a few batches and print summary
//! statistics, without going through the C ABI.

use std::env::args;
use std::path::Path;
use std::time::Instant;

use starway_loader::batch::{MAX_MOVES_PER_POS, MAX_PIECES_PER_POS};
use starway_loader::{loader_init, loader_next_batch};

fn main() {
    let data_path = args().nth(1).expect("Expected a data file!");
    let offsets_path = args().nth(2).expect("Expected an offsets file!");
    let batch_size: usize =
        args().nth(3).expect("Expected a batch size!").parse().expect("integer batch size");
    let num_threads: usize =
        args().nth(4).expect("Expected a thread count!").parse().expect("integer thread count");
    let num_batches: usize =
        args().nth(5).map_or(16, |n| n.parse().expect("integer batch count"));

    loader_init(Path::new(&data_path), Path::new(&offsets_path), batch_size, num_threads);

    let timer = Instant::now();
    let mut positions = 0u64;
    let mut features = 0u64;
    let mut moves = 0u64;

    for _ in 0..num_batches {
        let batch = loader_next_batch();

        let stm_features = unsafe {
            std::slice::from_raw_parts((*batch).active_features_stm, batch_size * MAX_PIECES_PER_POS)
        };
        let legal_moves = unsafe {
            std::slice::from_raw_parts((*batch).legal_moves_idxs, batch_size * MAX_MOVES_PER_POS)
        };

        positions += batch_size as u64;
        features += stm_features.iter().filter(|&&idx| idx >= 0).count() as u64;
        moves += legal_moves.iter().filter(|&&idx| idx >= 0).count() as u64;
    }

    let elapsed = timer.elapsed().as_secs_f64();

    println!("Loaded {num_batches} batches of {batch_size} in {elapsed:.2} seconds");
    println!("Positions / second: {:.0}", positions as f64 / elapsed);
    println!("Average pieces per position: {:.2}", features as f64 / positions as f64);
    println!("Average legal moves per position: {:.2}", moves as f64 / positions as f64);
}
