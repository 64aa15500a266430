mod convert;
mod display;
mod head;
mod interleave;
mod validate;

use structopt::StructOpt;

#[derive(StructOpt)]
pub enum Options {
    Convert(convert::ConvertOptions),
    Interleave(interleave::InterleaveOptions),
    Display(display::DisplayOptions),
    Head(head::HeadOptions),
    Validate(validate::ValidateOptions),
}

fn main() -> anyhow::Result<()> {
    match Options::from_args() {
        Options::Convert(options) => options.run(),
        Options::Interleave(options) => options.run(),
        Options::Display(options) => options.run(),
        Options::Head(options) => options.run(),
        Options::Validate(options) => options.run(),
    }
}

pub struct Rand(u64);

impl Default for Rand {
    fn default() -> Self {
        Self(
            (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("valid")
                .as_nanos()
                & 0xFFFF_FFFF_FFFF_FFFF) as u64,
        )
    }
}

impl Rand {
    #[cfg(test)]
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn rand(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}
