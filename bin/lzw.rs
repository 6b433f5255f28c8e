#![forbid(unsafe_code)]
use std::io::Write as _;
use std::path::PathBuf;
use std::{fs, io};

use bpaf::{construct, long, positional, Parser};

use adalzw::{decode::Decoder, encode::Encoder, ConfigError, Error, Mode, Threshold};

fn main() -> CodingResult {
    env_logger::init();
    CodingResult::catch_panic(|| {
        let options = options_parser()
            .to_options()
            .descr("Compress or expand data with adaptive LZW")
            .version(env!("CARGO_PKG_VERSION"))
            .run();
        let flags = Flags::from_options(options)?;
        run_coding(flags)
    })
}

fn run_coding(flags: Flags) -> Result<(), Error> {
    let input: Box<dyn io::BufRead> = match flags.input {
        Input::File(file) => {
            let data = fs::File::open(file)?;
            Box::new(io::BufReader::with_capacity(1 << 20, data))
        }
        Input::Stdin => Box::new(io::BufReader::with_capacity(1 << 20, io::stdin())),
    };

    let out = io::stdout();
    let mut out = io::BufWriter::new(out.lock());

    let result = match flags.operation {
        Operation::Compress(mode) => {
            let mut encoder = Encoder::with_threshold(mode, flags.threshold);
            encoder.into_stream(&mut out).encode_all(input)
        }
        Operation::Expand => {
            let mut decoder = Decoder::with_threshold(flags.threshold);
            decoder.into_stream(&mut out).decode_all(input)
        }
    };

    result.status?;
    out.flush()?;
    log::info!(
        "{}: read {} bytes, wrote {} bytes",
        flags.operation,
        result.bytes_read,
        result.bytes_written
    );
    Ok(())
}

struct Flags {
    input: Input,
    operation: Operation,
    threshold: Threshold,
}

#[derive(Debug)]
enum Input {
    File(PathBuf),
    Stdin,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Compress(Mode),
    Expand,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Compress(mode) => write!(f, "compress ({})", mode),
            Operation::Expand => write!(f, "expand"),
        }
    }
}

const USAGE: &str = "Usage: lzw - <n|r|m> < input > output   (compress)\n       \
                     lzw + < input > output         (expand)";

#[derive(Debug, Clone)]
struct Options {
    input: Option<PathBuf>,
    threshold: Option<f64>,
    inclusive: bool,
    direction: String,
    mode: Option<String>,
}

fn options_parser() -> impl Parser<Options> {
    let input = long("input")
        .short('i')
        .argument::<PathBuf>("FILE")
        .help("Read from a file instead of stdin, '-' for stdin")
        .optional();
    let threshold = long("threshold")
        .short('t')
        .argument::<f64>("FACTOR")
        .help("Ratio degradation factor that triggers a reset in monitor mode")
        .optional();
    let inclusive = long("inclusive")
        .switch()
        .help("Also reset when the degradation equals the threshold");
    let direction = positional::<String>("DIRECTION").help("'-' to compress, '+' to expand");
    let mode = positional::<String>("MODE")
        .help("Full dictionary policy when compressing: n(othing), r(eset) or m(onitor)")
        .optional();

    construct!(Options {
        input,
        threshold,
        inclusive,
        direction,
        mode,
    })
}

impl Flags {
    fn from_options(options: Options) -> Result<Self, ConfigError> {
        let letter = options.mode.as_deref();
        let operation = match options.direction.as_str() {
            "-" => Operation::Compress(Mode::from_letter(letter.unwrap_or(""))?),
            "+" => {
                if let Some(letter) = letter {
                    log::warn!("ignoring mode '{}', the stream header decides", letter);
                }
                Operation::Expand
            }
            other => return Err(ConfigError::UnknownDirection(other.to_owned())),
        };

        let mut threshold = match options.threshold {
            None => Threshold::default(),
            Some(factor) => Threshold::try_new(factor)?,
        };
        if options.inclusive {
            threshold = threshold.inclusive();
        }

        let input = match options.input {
            None => Input::Stdin,
            Some(path) if path.as_os_str() == "-" => Input::Stdin,
            Some(path) => Input::File(path),
        };

        Ok(Flags {
            input,
            operation,
            threshold,
        })
    }
}

enum CodingResult {
    Ok,
    Err(Error),
    Panic,
}

impl CodingResult {
    fn catch_panic(op: fn() -> Result<(), Error>) -> Self {
        std::panic::catch_unwind(|| match op() {
            Ok(()) => CodingResult::Ok,
            Err(err) => CodingResult::Err(err),
        })
        .unwrap_or(CodingResult::Panic)
    }
}

impl std::process::Termination for CodingResult {
    fn report(self) -> std::process::ExitCode {
        match self {
            CodingResult::Ok => std::process::ExitCode::SUCCESS,
            CodingResult::Err(err) => {
                eprintln!("{}", err);
                if let Error::Config(_) = err {
                    eprintln!("{}", USAGE);
                }
                std::process::ExitCode::FAILURE
            }
            CodingResult::Panic => {
                eprintln!(
                    "The process failed irrecoverably! This should never happen and is a bug."
                );
                std::process::ExitCode::from(128)
            }
        }
    }
}
