//! Compresses stdin to stdout in the mode named by the first argument, `reset` if none is given.
//!
//! The size of the input and output is reported on stderr.
use std::env;
use std::io::{self, BufWriter};

use adalzw::{Encoder, Error, Mode};

fn main() {
    let result = (|| -> Result<(usize, usize), Error> {
        let mode = match env::args().nth(1) {
            Some(name) => name.parse::<Mode>()?,
            None => Mode::Reset,
        };
        let mut encoder = Encoder::new(mode);
        let stdin = io::stdin();
        let stdout = BufWriter::new(io::stdout().lock());
        let result = encoder.into_stream(stdout).encode_all(stdin.lock());
        result.status?;
        Ok((result.bytes_read, result.bytes_written))
    })();

    match result {
        Ok((read, written)) => eprintln!("{} -> {} bytes", read, written),
        Err(err) => eprintln!("{}", err),
    }
}
