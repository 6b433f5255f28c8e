//! Decompresses stdin to stdout, whatever mode the stream was written in.
use std::io::{self, BufWriter};

use adalzw::{Decoder, Error};

fn main() {
    let mut decoder = Decoder::new();
    let result = (|| -> Result<(), Error> {
        let stdout = BufWriter::new(io::stdout().lock());
        decoder.into_stream(stdout).decode_all(io::stdin().lock()).status
    })();

    match (result, decoder.mode()) {
        (Ok(()), Some(mode)) => eprintln!("expanded a {} stream", mode),
        (Ok(()), None) => {}
        (Err(err), _) => eprintln!("{}", err),
    }
}
