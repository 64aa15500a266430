//! Montyformat → Starway conversion with position filtering and a bounded
//! in-RAM shuffle.
//!
//! Records accumulate in a buffer whose capacity is a multiple of the batch
//! size; each time it fills it is shuffled and appended to the data file,
//! and the starting offset of every batch goes to the offsets sidecar.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::Context;
use starway_chess::bitboard::Color;
use starway_chess::movegen::legal_moves;
use structopt::StructOpt;

use starway_format::{DataEntry, GameReader, ENTRY_SIZE};

use crate::Rand;

const MIN_FULLMOVE_COUNTER: u16 = 9;
const MAX_HALFMOVE_CLOCK: u8 = 89;
const MAX_LEGAL_MOVES: usize = 64;
const MAX_SCORE_CP: i16 = 8000;

#[derive(StructOpt)]
pub struct ConvertOptions {
    /// Montyformat input file
    #[structopt(required = true)]
    input: PathBuf,

    /// Starway data output file
    #[structopt(required = true)]
    data_output: PathBuf,

    /// Batch offsets sidecar output file
    #[structopt(required = true)]
    offsets_output: PathBuf,

    /// Data entries per batch
    #[structopt(required = true)]
    batch_size: usize,

    /// Shuffle buffer size in MB
    #[structopt(required = true)]
    buffer_mb: usize,

    /// Stop after writing this many data entries
    #[structopt(short, long)]
    limit: Option<u64>,
}

impl ConvertOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        println!("Input file: {:#?}", self.input);
        println!("Data output file: {:#?}", self.data_output);
        println!("Offsets output file: {:#?}", self.offsets_output);
        println!("Batch size: {} data entries", self.batch_size);
        println!("Buffer size: {} MB", self.buffer_mb);

        anyhow::ensure!(self.batch_size > 0, "batch size must be positive");

        let capacity = buffer_capacity(self.buffer_mb, self.batch_size)?;
        println!("Buffer capacity: {capacity} data entries");

        let input = File::open(&self.input)
            .with_context(|| format!("could not open {:#?}", self.input))?;
        let mut reader = GameReader::new(BufReader::new(input));

        let data_output = File::create(&self.data_output)
            .with_context(|| format!("could not create {:#?}", self.data_output))?;
        let offsets_output = File::create(&self.offsets_output)
            .with_context(|| format!("could not create {:#?}", self.offsets_output))?;

        let mut writer = ShuffleWriter::new(
            capacity,
            self.batch_size,
            BufWriter::new(data_output),
            BufWriter::new(offsets_output),
            Rand::default(),
        );

        let time = Instant::now();
        let mut filter = Filter::default();
        let mut games = 0u64;
        let mut visits = Vec::new();

        'games: loop {
            if self.limit.is_some_and(|limit| writer.entries_pushed() >= limit) {
                break;
            }

            let Some(board) = reader.read_board().context("reading game header")? else {
                break;
            };

            anyhow::ensure!(!board.is_frc(), "FRC board in game {}", games + 1);

            games += 1;

            let mut pos = board.decompress();
            pos.validate();

            let white_result = reader.read_result().with_context(|| format!("game {games}"))?;

            while let Some(ply) =
                reader.read_ply(&mut visits).with_context(|| format!("game {games}"))?
            {
                let best_move = ply.best_move;
                let white_to_move = pos.side_to_move() == Color::White;

                let moving =
                    pos.piece_on(best_move.src()).expect("best move starts on an own piece");
                best_move.validate(white_to_move, moving);

                let mut legal = legal_moves(&pos);
                assert_eq!(
                    legal.len(),
                    usize::from(ply.move_count),
                    "move count mismatch in game {games}"
                );

                // Visits are stored in ascending move-encoding order.
                legal.sort_by_encoding();

                let best_idx = legal
                    .iter()
                    .position(|m| *m == best_move)
                    .expect("best move is legal");

                debug_assert_eq!(visits.iter().max(), Some(&255));

                let stm_result =
                    if white_to_move { white_result } else { 2 - white_result };
                let score_cp = montyformat_score_to_centipawns(ply.score);

                if !filter.should_skip(&pos, legal.len(), score_cp, visits[best_idx]) {
                    let entry = DataEntry::new(&pos, stm_result, score_cp, best_move);
                    entry.validate();
                    writer.push(entry)?;

                    if writer.entries_pushed() % 1_048_576 == 0 {
                        print!(
                            "Game {games}, wrote {} data entries\r",
                            writer.entries_pushed()
                        );
                        let _ = std::io::stdout().flush();
                    }

                    if self.limit.is_some_and(|limit| writer.entries_pushed() >= limit) {
                        break 'games;
                    }
                }

                pos.make_move(best_move);
                pos.validate();
            }
        }

        let (entries, batches) = writer.finish()?;

        println!();
        println!("Parsed {games} games");
        println!("Wrote {entries} data entries in {batches} batches");
        filter.print_counts();
        println!("> Took {:.2} seconds.", time.elapsed().as_secs_f32());

        Ok(())
    }
}

fn buffer_capacity(buffer_mb: usize, batch_size: usize) -> anyhow::Result<usize> {
    let capacity = buffer_mb * 1_000_000 / ENTRY_SIZE / batch_size * batch_size;
    anyhow::ensure!(capacity > 0, "buffer of {buffer_mb} MB holds no full batch");
    Ok(capacity)
}

/// Montyformat stores the side-to-move score as `u16::MAX * sigmoid(cp)`;
/// undo it with the logit at scale 400, saturating the exact 0/1 endpoints.
fn montyformat_score_to_centipawns(score: u16) -> i16 {
    let wdl = f64::from(score) / f64::from(u16::MAX);

    if wdl == 0.0 {
        return -32767;
    }

    if wdl == 1.0 {
        return 32767;
    }

    let cp = ((wdl / (1.0 - wdl)).ln() * 400.0).round();
    cp.clamp(-32767.0, 32767.0) as i16
}

/// Skip reasons are counted individually and reported once at the end.
#[derive(Default)]
struct Filter {
    insufficient_material: u64,
    bad_fullmove_counter: u64,
    bad_halfmove_clock: u64,
    too_many_moves: u64,
    extreme_score: u64,
    best_move_zero_visits: u64,
}

impl Filter {
    fn should_skip(
        &mut self,
        pos: &starway_chess::Position,
        num_moves: usize,
        score_cp: i16,
        best_move_visits: u8,
    ) -> bool {
        let mut skip = false;

        if pos.is_insufficient_material() {
            self.insufficient_material += 1;
            skip = true;
        }

        if pos.fullmove_counter() < MIN_FULLMOVE_COUNTER {
            self.bad_fullmove_counter += 1;
            skip = true;
        }

        if pos.halfmove_clock() > MAX_HALFMOVE_CLOCK {
            self.bad_halfmove_clock += 1;
            skip = true;
        }

        if num_moves > MAX_LEGAL_MOVES {
            self.too_many_moves += 1;
            skip = true;
        }

        if score_cp.abs() > MAX_SCORE_CP {
            self.extreme_score += 1;
            skip = true;
        }

        if best_move_visits == 0 {
            self.best_move_zero_visits += 1;
            skip = true;
        }

        skip
    }

    fn print_counts(&self) {
        println!("Filter counts:");
        println!("  Insufficient material: {}", self.insufficient_material);
        println!("  Fullmove counter < {MIN_FULLMOVE_COUNTER}: {}", self.bad_fullmove_counter);
        println!("  Halfmove clock > {MAX_HALFMOVE_CLOCK}: {}", self.bad_halfmove_clock);
        println!("  Legal moves > {MAX_LEGAL_MOVES}: {}", self.too_many_moves);
        println!("  Score > {MAX_SCORE_CP} cp: {}", self.extreme_score);
        println!("  Best move has 0 visits: {}", self.best_move_zero_visits);
    }
}

struct ShuffleWriter<D, O> {
    buffer: Vec<DataEntry>,
    capacity: usize,
    batch_size: usize,
    data: D,
    offsets: O,
    entries_pushed: u64,
    bytes_written: u64,
    batches_written: u64,
    rng: Rand,
}

impl<D: Write, O: Write> ShuffleWriter<D, O> {
    fn new(capacity: usize, batch_size: usize, data: D, offsets: O, rng: Rand) -> Self {
        debug_assert!(capacity % batch_size == 0);

        let mut buffer = Vec::new();
        buffer.reserve_exact(capacity);

        Self {
            buffer,
            capacity,
            batch_size,
            data,
            offsets,
            entries_pushed: 0,
            bytes_written: 0,
            batches_written: 0,
            rng,
        }
    }

    fn entries_pushed(&self) -> u64 {
        self.entries_pushed
    }

    fn push(&mut self, entry: DataEntry) -> std::io::Result<()> {
        self.buffer.push(entry);
        self.entries_pushed += 1;

        if self.buffer.len() == self.capacity {
            self.flush_buffer()?;
        }

        Ok(())
    }

    fn flush_buffer(&mut self) -> std::io::Result<()> {
        // A partial batch at the tail is dropped, never written.
        self.buffer.truncate(self.buffer.len() / self.batch_size * self.batch_size);

        for i in (0..self.buffer.len()).rev() {
            let j = self.rng.rand() as usize % (i + 1);
            self.buffer.swap(i, j);
        }

        for (i, entry) in self.buffer.iter().enumerate() {
            if i % self.batch_size == 0 {
                self.offsets.write_all(&self.bytes_written.to_le_bytes())?;
                self.batches_written += 1;
            }

            self.data.write_all(&entry.to_bytes())?;
            self.bytes_written += ENTRY_SIZE as u64;
        }

        self.buffer.clear();
        Ok(())
    }

    /// Returns (entries written, batches written).
    fn finish(mut self) -> std::io::Result<(u64, u64)> {
        self.flush_buffer()?;
        self.data.flush()?;
        self.offsets.flush()?;

        Ok((self.bytes_written / ENTRY_SIZE as u64, self.batches_written))
    }
}
