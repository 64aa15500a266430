//! Full scan of a Starway data file (and optionally its offsets sidecar),
//! counting every class of invalid record instead of stopping at the first.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
    time::Instant,
};

use anyhow::Context;
use structopt::StructOpt;

use starway_chess::bitboard::{contains, is_backrank, rank_of, Color, Piece};
use starway_format::{entry::Mask, DataEntry, ENTRY_SIZE};

#[derive(StructOpt)]
pub struct ValidateOptions {
    /// Starway data file
    #[structopt(required = true)]
    input: PathBuf,

    /// Batch offsets sidecar to cross-check
    #[structopt(short, long)]
    offsets: Option<PathBuf>,

    /// Data entries per batch (required with --offsets)
    #[structopt(short, long)]
    batch_size: Option<usize>,
}

const CHECK_MESSAGES: [&str; 8] = [
    "Invalid number of stm kings",
    "Invalid number of nstm kings",
    "No non-king pieces on the board",
    "Too many pieces on the board",
    "King square does not match occupancy",
    "Pawn on 1st/8th rank",
    "Reserved misc bits set",
    "Null best move",
];

impl ValidateOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        let input_size = std::fs::metadata(&self.input)
            .with_context(|| format!("could not stat {:#?}", self.input))?
            .len();

        anyhow::ensure!(
            input_size % ENTRY_SIZE as u64 == 0,
            "data file size {input_size} is not a multiple of {ENTRY_SIZE}"
        );

        let total = input_size / ENTRY_SIZE as u64;
        println!("Checking {total} data entries in {:#?}", self.input);

        let file = File::open(&self.input)
            .with_context(|| format!("could not open {:#?}", self.input))?;
        let mut reader = BufReader::new(file);

        let timer = Instant::now();
        let mut invalid = [0u64; CHECK_MESSAGES.len()];
        let mut results = [0u64; 3];
        let mut found = false;

        let mut raw = [0u8; ENTRY_SIZE];
        let mut done = 0u64;

        while done < total {
            reader.read_exact(&mut raw).context("reading data entry")?;
            let entry = DataEntry::from_bytes(&raw);

            let mut check = |cond: bool, idx: usize| {
                if !cond {
                    invalid[idx] += 1;

                    if !found {
                        found = true;
                        println!("There is at least one invalid data entry!");
                    }
                }
            };

            let mut stm_kings = 0;
            let mut nstm_kings = 0;
            let mut pieces = 0;

            for (sq, color, piece) in entry.pieces_iter() {
                pieces += 1;

                match piece {
                    Piece::King => {
                        let mask = if color == Color::White {
                            stm_kings += 1;
                            Mask::OurKingSq
                        } else {
                            nstm_kings += 1;
                            Mask::TheirKingSq
                        };

                        check(u32::from(sq) == entry.get(mask), 4);
                    }
                    Piece::Pawn => check(!is_backrank(rank_of(sq)), 5),
                    _ => {}
                }
            }

            check(stm_kings == 1, 0);
            check(nstm_kings == 1, 1);
            check(pieces > 2, 2);
            check(pieces <= 32, 3);
            check(contains(entry.occupied, entry.get(Mask::OurKingSq) as u8), 4);
            check(entry.misc >> 22 == 0, 6);
            check(entry.best_move > 0, 7);

            results[(entry.get(Mask::StmResult) as usize).min(2)] += 1;

            done += 1;
            if done % 10_000_000 == 0 {
                println!("Checked {done} data entries");
            }
        }

        if let Some(offsets_path) = &self.offsets {
            self.check_offsets(offsets_path, total)?;
        }

        println!();
        println!("SUMMARY:");
        println!("Checked {total} data entries in {:.2} seconds", timer.elapsed().as_secs_f32());
        println!("Wins: {}, Draws: {}, Losses: {}", results[2], results[1], results[0]);

        for (message, count) in CHECK_MESSAGES.iter().zip(invalid) {
            if count > 0 {
                println!("{message}: {count}");
            }
        }

        if !found {
            println!("All data entries are valid");
        }

        Ok(())
    }

    fn check_offsets(&self, offsets_path: &PathBuf, total_entries: u64) -> anyhow::Result<()> {
        let batch_size = self.batch_size
            .context("--batch-size is required to cross-check an offsets sidecar")?
            as u64;

        let bytes = std::fs::read(offsets_path)
            .with_context(|| format!("could not read {offsets_path:#?}"))?;

        anyhow::ensure!(bytes.len() % 8 == 0, "offsets file size is not a multiple of 8");

        let num_batches = bytes.len() as u64 / 8;
        anyhow::ensure!(
            num_batches * batch_size == total_entries,
            "{num_batches} batches of {batch_size} do not cover {total_entries} entries"
        );

        let mut prev = None;

        for raw in bytes.chunks_exact(8) {
            let offset = u64::from_le_bytes(raw.try_into().unwrap());

            anyhow::ensure!(offset % ENTRY_SIZE as u64 == 0, "misaligned batch offset {offset}");
            anyhow::ensure!(
                offset + batch_size * ENTRY_SIZE as u64 <= total_entries * ENTRY_SIZE as u64,
                "batch at offset {offset} runs past end of data"
            );

            if let Some(prev) = prev {
                anyhow::ensure!(offset > prev, "batch offsets are not increasing");
            }

            prev = Some(offset);
        }

        println!("Offsets sidecar: {num_batches} batches, all aligned and in order");

        Ok(())
    }
}
