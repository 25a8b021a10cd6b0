//! # `sdio-spi`
//!
//! A decoder for SDIO CMD53 (IO_RW_EXTENDED) transactions exchanged
//! over SPI with a Morse Micro MM6108 WiFi chip.
//!
//! Input is a capture of the SPI bus, already split into chip-select
//! windows and MOSI/MISO bytes by the capture layer. Every window that
//! starts with a CMD53 frame yields one [`Transaction`], which carries the
//! decoded argument fields, a [`Category`](classify::Category), symbolic
//! register names, and, for accesses to the interrupt status and clear
//! registers, the interrupt sources that were set.
//!
//! Two entry points are offered:
//!
//! - [`Assembler`], which decodes a single [`Window`].
//!
//! - [`Decoder`], which reads a text trace (see [`trace`]) from the
//! given [`BufRead`](std::io::BufRead) instance and offers the
//! [`Transactions`] iterator over it.
//!
//! ```
//! use sdio_spi::{Assembler, AssemblerOptions, ProtocolTables, Window};
//!
//! let window = Window::from_bytes(&[0xFF, 0x75, 0x14, 0xC0, 0xA0, 0x04, 0x89], &[]);
//! let mut assembler = Assembler::new(&ProtocolTables::MM6108, AssemblerOptions::default());
//! let transaction = assembler.assemble(&window).unwrap();
//!
//! assert_eq!(transaction.address, 0x6050);
//! assert_eq!(
//!     transaction.to_string(),
//!     "IRQ RD: Registers/Control (≤4B) | 0x6050 [N/A]"
//! );
//! ```
#![deny(rustdoc::broken_intra_doc_links)]

mod assembler;
pub mod classify;
pub mod frame;
pub mod irq;
mod iter;
pub mod trace;
mod transaction;
pub mod window;

pub use assembler::{Assembler, AssemblerOptions};
pub use iter::Transactions;
pub use transaction::{Transaction, TransferMode};
pub use window::{BusEvent, ByteEvent, Direction, Window, WindowCollector};

use std::io::BufRead;

use tracing::debug;

use classify::KnownAddressTable;
use frame::PAYLOAD_OFFSET;
use irq::InterruptBitTable;
use trace::{TraceError, TraceReader};

/// The lookup tables of a chip. Never modified after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTables {
    pub addresses: KnownAddressTable,
    pub interrupts: InterruptBitTable,
}

impl ProtocolTables {
    pub const MM6108: Self = Self {
        addresses: KnownAddressTable::MM6108,
        interrupts: InterruptBitTable::MM6108,
    };
}

/// Reasons a chip-select window does not yield a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MalformedFrame {
    /// Fewer MOSI bytes than a command frame.
    #[error("Window holds {len} MOSI bytes, fewer than a command frame")]
    Truncated { len: usize },

    /// The first MOSI byte is not the start marker.
    #[error("Invalid start marker: {:#04x}", .0)]
    InvalidStartMarker(u8),

    /// The command token is not CMD53.
    #[error("Unsupported command token: {:#04x}", .0)]
    UnsupportedCommand(u8),
}

/// [`Decoder`] configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// How many leading MOSI bytes may precede the start marker of a
    /// frame.
    pub frame_search: usize,

    /// Offset of the interrupt payload word on MISO, counted from the
    /// start of the frame.
    pub payload_offset: usize,

    /// When set, [`Transactions`] yields [`MalformedFrame`]s as
    /// `Result::Err` instead of skipping them.
    pub expect_malformed: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            frame_search: 0,
            payload_offset: PAYLOAD_OFFSET,
            expect_malformed: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DecoderErrorInt {
    #[error("Failed to read trace: {0}")]
    Trace(#[from] TraceError),
    #[error("EOF encountered")]
    Eof,
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] MalformedFrame),
}

/// Set of errors that can occur during decode.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("A malformed frame was encountered: {0}")]
    MalformedFrame(#[from] MalformedFrame),
}

/// SDIO-over-SPI trace decoder.
pub struct Decoder<R> {
    events: TraceReader<R>,
    collector: WindowCollector,
    assembler: Assembler<'static>,
    expect_malformed: bool,
}

impl<R> Decoder<R>
where
    R: BufRead,
{
    pub fn new(reader: R, options: DecoderOptions) -> Decoder<R> {
        Decoder {
            events: TraceReader::new(reader),
            collector: WindowCollector::new(),
            assembler: Assembler::new(
                &ProtocolTables::MM6108,
                AssemblerOptions {
                    frame_search: options.frame_search,
                    payload_offset: options.payload_offset,
                },
            ),
            expect_malformed: options.expect_malformed,
        }
    }

    /// Returns a reference to the underlying [`BufRead`].
    pub fn get_ref(&self) -> &R {
        self.events.get_ref()
    }

    /// Returns an iterator over [`Transaction`]s.
    pub fn transactions(&mut self) -> Transactions<R> {
        Transactions::new(self)
    }

    /// Returns the next [`Transaction`] in the trace.
    fn next_transaction(&mut self) -> Result<Transaction, DecoderErrorInt> {
        loop {
            let event = match self.events.read_event()? {
                Some(event) => event,
                None => {
                    if self.collector.is_open() {
                        debug!("trace ended with chip-select asserted; discarding open window");
                    }
                    return Err(DecoderErrorInt::Eof);
                }
            };

            let window = match self.collector.push(event) {
                Some(window) => window,
                None => continue,
            };

            match self.assembler.assemble(&window) {
                Ok(transaction) => return Ok(transaction),
                Err(malformed) if self.expect_malformed => return Err(malformed.into()),
                Err(malformed) => debug!(start = ?window.start, %malformed, "window rejected"),
            }
        }
    }
}
