//! Slice the first N games off a Montyformat file, for making small test
//! inputs out of big self-play dumps.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use structopt::StructOpt;

use starway_format::GameReader;

#[derive(StructOpt)]
pub struct HeadOptions {
    /// Montyformat input file
    #[structopt(required = true)]
    input: PathBuf,

    /// Montyformat output file
    #[structopt(required = true)]
    output: PathBuf,

    /// Number of games to copy
    #[structopt(required = true)]
    games: usize,
}

impl HeadOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        println!("Reading from {:#?}", self.input);
        println!("Writing to {:#?}", self.output);

        let input = File::open(&self.input)
            .with_context(|| format!("could not open {:#?}", self.input))?;
        let mut reader = GameReader::new(BufReader::new(input));

        let output = File::create(&self.output)
            .with_context(|| format!("could not create {:#?}", self.output))?;
        let mut writer = BufWriter::new(output);

        let mut buffer = Vec::new();
        let mut games = 0usize;
        let total = self.games;

        while games < total && reader.read_game_raw(&mut buffer).context("reading game")? {
            writer.write_all(&buffer)?;
            buffer.clear();

            games += 1;

            if games % 16384 == 0 {
                print!("Written {games} / {total} ({:.2}%)\r", games as f64 / total as f64 * 100.0);
                let _ = std::io::stdout().flush();
            }
        }

        writer.flush()?;

        println!("Written {games} / {total} ({:.2}%)", games as f64 / total as f64 * 100.0);

        Ok(())
    }
}
