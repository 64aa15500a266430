//! Globalises the converter's per-buffer shuffle.
//!
//! The data file is split into chunks of one converter buffer each, with an
//! independent read handle per chunk. Records are then drawn uniformly from
//! whatever remains across all chunks and appended to the output, together
//! with a fresh offsets sidecar.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use anyhow::Context;
use structopt::StructOpt;

use starway_format::{DataEntry, ENTRY_SIZE};

use crate::Rand;

#[derive(StructOpt)]
pub struct InterleaveOptions {
    /// Starway data input file
    #[structopt(required = true)]
    data_input: PathBuf,

    /// Starway data output file
    #[structopt(required = true)]
    data_output: PathBuf,

    /// Batch offsets input file
    #[structopt(required = true)]
    offsets_input: PathBuf,

    /// Batch offsets output file
    #[structopt(required = true)]
    offsets_output: PathBuf,

    /// The converter's buffer capacity, in data entries
    #[structopt(required = true)]
    buffer_capacity: usize,

    /// Data entries per batch
    #[structopt(required = true)]
    batch_size: usize,
}

impl InterleaveOptions {
    pub fn run(&self) -> anyhow::Result<()> {
        println!("Data input file: {:#?}", self.data_input);
        println!("Data output file: {:#?}", self.data_output);
        println!("Offsets input file: {:#?}", self.offsets_input);
        println!("Offsets output file: {:#?}", self.offsets_output);
        println!("Buffer capacity: {} data entries", self.buffer_capacity);
        println!("Batch size: {} data entries", self.batch_size);

        anyhow::ensure!(self.batch_size > 0, "batch size must be positive");
        anyhow::ensure!(
            self.buffer_capacity > 0 && self.buffer_capacity % self.batch_size == 0,
            "buffer capacity must be a positive multiple of the batch size"
        );

        let mut offsets = read_offsets(&self.offsets_input)?;
        println!("Batches: {}", offsets.len());

        let total_entries = offsets.len() * self.batch_size;

        let input_size = std::fs::metadata(&self.data_input)
            .with_context(|| format!("could not stat {:#?}", self.data_input))?
            .len();

        anyhow::ensure!(
            input_size == (total_entries * ENTRY_SIZE) as u64,
            "data file size {input_size} does not match {total_entries} entries"
        );

        // One chunk per converter buffer dump.
        let num_chunks = total_entries.div_ceil(self.buffer_capacity);
        let batches_per_chunk = self.buffer_capacity / self.batch_size;
        let mut chunks = Vec::with_capacity(num_chunks);

        for i in 0..num_chunks {
            let mut file = File::open(&self.data_input)
                .with_context(|| format!("could not open {:#?}", self.data_input))?;

            file.seek(SeekFrom::Start(offsets[batches_per_chunk * i]))?;

            let remaining = if i == num_chunks - 1 {
                total_entries - self.buffer_capacity * (num_chunks - 1)
            } else {
                self.buffer_capacity
            };

            chunks.push((remaining, BufReader::new(file)));
        }

        let data_output = File::create(&self.data_output)
            .with_context(|| format!("could not create {:#?}", self.data_output))?;
        let mut writer = BufWriter::new(data_output);

        let mut rng = Rand::default();
        let mut remaining = total_entries;
        let mut raw = [0u8; ENTRY_SIZE];

        while remaining > 0 {
            let mut spot = rng.rand() as usize % remaining;
            let mut idx = 0;

            while chunks[idx].0 < spot {
                spot -= chunks[idx].0;
                idx += 1;
            }

            let (count, reader) = &mut chunks[idx];

            reader.read_exact(&mut raw).context("reading data entry")?;
            DataEntry::from_bytes(&raw).validate();

            let written = total_entries - remaining;

            if written % self.batch_size == 0 {
                offsets[written / self.batch_size] = (written * ENTRY_SIZE) as u64;
            }

            writer.write_all(&raw)?;

            remaining -= 1;
            *count -= 1;

            if *count == 0 {
                chunks.swap_remove(idx);
            }

            if remaining % 16_777_216 == 0 {
                let written = total_entries - remaining;
                print!(
                    "Written {written} / {total_entries} ({:.2}%)\r",
                    written as f64 / total_entries as f64 * 100.0
                );
                let _ = std::io::stdout().flush();
            }
        }

        writer.flush()?;

        let offsets_output = File::create(&self.offsets_output)
            .with_context(|| format!("could not create {:#?}", self.offsets_output))?;
        let mut offsets_writer = BufWriter::new(offsets_output);

        for offset in &offsets {
            offsets_writer.write_all(&offset.to_le_bytes())?;
        }

        offsets_writer.flush()?;

        println!();
        println!("Written {total_entries} data entries");

        let output_size = std::fs::metadata(&self.data_output)?.len();
        anyhow::ensure!(
            output_size == input_size,
            "output size {output_size} does not match input size {input_size}"
        );

        Ok(())
    }
}

fn read_offsets(path: &PathBuf) -> anyhow::Result<Vec<u64>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("could not read {path:#?}"))?;

    anyhow::ensure!(bytes.len() % 8 == 0, "offsets file size is not a multiple of 8");
    anyhow::ensure!(!bytes.is_empty(), "offsets file is empty");

    Ok(bytes.chunks_exact(8).map(|raw| u64::from_le_bytes(raw.try_into().unwrap())).collect())
}
