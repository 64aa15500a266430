//! Pretty-print a single Starway record, mostly for eyeballing converted
//! data.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::PathBuf,
};

use anyhow::Context;
use structopt::StructOpt;

use starway_chess::Move;
use starway_format::{entry::Mask, DataEntry, ENTRY_SIZE};

#[derive(StructOpt)]
pub struct DisplayOptions {
    /// Starway data file
    #[structopt(required = true)]
    data_file: PathBuf,

    /// Data entry number, starting from 1
    #[structopt(required = true)]
    entry_number: u64,
}

impl DisplayOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.entry_number >= 1, "data entries are numbered from 1");

        let mut file = File::open(&self.data_file)
            .with_context(|| format!("could not open {:#?}", self.data_file))?;

        file.seek(SeekFrom::Start((self.entry_number - 1) * ENTRY_SIZE as u64))?;

        let mut raw = [0u8; ENTRY_SIZE];
        file.read_exact(&mut raw).with_context(|| {
            format!("could not read data entry {} from {:#?}", self.entry_number, self.data_file)
        })?;

        let entry = DataEntry::from_bytes(&raw);
        entry.validate();

        println!("Data entry {} of {:#?}:", self.entry_number, self.data_file);
        println!();
        println!("{}", entry.reconstruct());
        println!("(oriented: the side to move is shown as white)");
        println!();

        println!("Black to move: {}", entry.get(Mask::Stm) > 0);
        println!("In check: {}", entry.get(Mask::InCheck) > 0);
        println!("Short castling right: {}", entry.get(Mask::CastlingKs) > 0);
        println!("Long castling right: {}", entry.get(Mask::CastlingQs) > 0);

        let ep_file = entry.get(Mask::EpFile);
        if ep_file < 8 {
            println!("En passant file: {}", (b'a' + ep_file as u8) as char);
        } else {
            println!("En passant file: none");
        }

        println!("Result for side to move: {}", entry.get(Mask::StmResult) as f32 / 2.0);
        println!("Score: {} cp", entry.stm_score);
        println!("Best move: {}", Move::from_u16(entry.best_move));

        Ok(())
    }
}
