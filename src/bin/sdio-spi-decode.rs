use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sdio_spi::{Decoder, DecoderError, DecoderOptions, Transaction};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    about = "An SDIO-over-SPI CMD53 decoder for Morse Micro MM6108 bus captures. Reads a text trace of chip-select and MOSI/MISO byte events and prints one line per transaction."
)]
struct Opt {
    #[structopt(
        long = "--frame-search",
        default_value = "0",
        help = "Number of leading MOSI bytes that may precede the start marker of a frame"
    )]
    frame_search: usize,

    #[structopt(
        long = "--payload-offset",
        default_value = "11",
        help = "Offset of the interrupt payload word on MISO, counted from the start of the frame"
    )]
    payload_offset: usize,

    #[structopt(
        long = "--expect-malformed",
        help = "Report windows that do not carry a CMD53 frame instead of skipping them"
    )]
    expect_malformed: bool,

    #[structopt(long = "--json", help = "Print transactions as JSON objects, one per line")]
    json: bool,

    #[structopt(
        long = "--baseline",
        help = "Wall-clock time at which the capture started (RFC 3339); prints absolute timestamps"
    )]
    baseline: Option<DateTime<Utc>>,

    #[structopt(name = "FILE", parse(from_os_str), help = "Trace input file.")]
    file: PathBuf,
}

fn main() -> Result<()> {
    init_logging();
    let opt = Opt::from_args();

    let file = File::open(&opt.file).with_context(|| format!("Failed to open {:?}", opt.file))?;
    let mut decoder = Decoder::new(
        BufReader::new(file),
        DecoderOptions {
            frame_search: opt.frame_search,
            payload_offset: opt.payload_offset,
            expect_malformed: opt.expect_malformed,
        },
    );

    for transaction in decoder.transactions() {
        match transaction {
            Ok(transaction) => print_transaction(&opt, &transaction)?,
            Err(DecoderError::MalformedFrame(m)) => println!("Error: {}", m),
            Err(e) => return Err(e).context("Decoder error"),
        }
    }

    Ok(())
}

fn print_transaction(opt: &Opt, transaction: &Transaction) -> Result<()> {
    if opt.json {
        let json = serde_json::to_string(transaction).context("Failed to serialize transaction")?;
        println!("{}", json);
        return Ok(());
    }

    match opt.baseline.and_then(|b| transaction.absolute_start(b)) {
        Some(at) => println!(
            "[{}] {}",
            at.to_rfc3339_opts(SecondsFormat::Micros, true),
            transaction
        ),
        None => println!("[{:.6}] {}", transaction.start.as_secs_f64(), transaction),
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
}
