use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::classify::{AddressName, Category, FunctionLabel, IrqRegister};
use crate::frame::{AccessType, BLOCK_SIZE};
use crate::irq::{InterruptName, NameList};

/// A decoded CMD53 transaction; one per accepted chip-select window.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transaction {
    pub access: AccessType,

    /// SDIO function number, 0 to 7.
    pub function: u8,

    /// `None` for functions without a known description.
    pub function_label: Option<FunctionLabel>,

    /// 17-bit register address.
    pub address: u32,

    /// `None` for addresses without a known name.
    pub address_label: Option<AddressName>,

    /// Bytes in byte mode, blocks in block mode.
    pub count: u16,

    pub block_mode: bool,
    pub increment_addressing: bool,
    pub category: Category,

    /// The 32-bit word read from or echoed by an interrupt register.
    /// `None` for other registers, and for interrupt register accesses
    /// whose response was not captured in full.
    pub payload: Option<u32>,

    /// Sources set in [`payload`](Self::payload), lowest bit first.
    pub interrupts: Option<Vec<InterruptName>>,

    /// CRC7 trailer of the command frame. Not verified.
    pub crc: u8,

    /// When chip-select was asserted.
    pub start: Duration,

    /// When chip-select was released.
    pub end: Duration,
}

/// Transfer unit and addressing mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferMode {
    pub block_mode: bool,
    pub increment_addressing: bool,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.block_mode { "Block" } else { "Byte" })?;
        f.write_str(if self.increment_addressing {
            ",Incr"
        } else {
            ",Fixed"
        })
    }
}

impl Transaction {
    /// The interrupt register this transaction accesses. Card control
    /// transactions never access one.
    pub fn irq_register(&self) -> Option<IrqRegister> {
        match self.category {
            Category::CardControl => None,
            _ => IrqRegister::at(self.address),
        }
    }

    /// Number of bytes transferred: `count` blocks of [`BLOCK_SIZE`] in
    /// block mode, `count` bytes otherwise.
    pub fn transfer_size(&self) -> u32 {
        let count = u32::from(self.count);
        if self.block_mode {
            count * BLOCK_SIZE
        } else {
            count
        }
    }

    pub fn mode(&self) -> TransferMode {
        TransferMode {
            block_mode: self.block_mode,
            increment_addressing: self.increment_addressing,
        }
    }

    /// Wall-clock time of [`start`](Self::start), given the wall-clock
    /// time at which the capture began.
    pub fn absolute_start(&self, baseline: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let offset = chrono::Duration::from_std(self.start).ok()?;
        baseline.checked_add_signed(offset)
    }

    fn label(&self) -> Label<'_> {
        Label(self)
    }
}

struct Label<'a>(&'a Transaction);

impl fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.function_label {
            Some(label) => write!(f, "{}", label),
            None => write!(f, "Fn{}", self.0.function),
        }
    }
}

struct Interrupts<'a>(&'a Option<Vec<InterruptName>>);

impl fmt::Display for Interrupts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(names) => write!(f, "{}", NameList(names)),
            None => f.write_str("N/A"),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rw, read_write) = match self.access {
            AccessType::Read => ("RD", "Read"),
            AccessType::Write => ("WR", "Write"),
        };

        match (self.category, self.irq_register()) {
            (Category::CardControl, _) => write!(
                f,
                "CARD: {} | Addr:0x{:04X} {} Cnt:{}",
                self.label(),
                self.address,
                read_write,
                self.count
            ),
            (_, Some(IrqRegister::Status)) => write!(
                f,
                "IRQ RD: {} | 0x{:04X} [{}]",
                self.label(),
                self.address,
                Interrupts(&self.interrupts)
            ),
            (_, Some(IrqRegister::Clear)) => {
                write!(f, "IRQ CLR: {} | 0x{:04X} ", self.label(), self.address)?;
                match self.payload {
                    Some(value) => write!(f, "(val:0x{:08X})", value)?,
                    None => f.write_str("(val:N/A)")?,
                }
                write!(f, " [{}]", Interrupts(&self.interrupts))
            }
            (Category::BulkData, None) => write!(
                f,
                "BULK {}: {} | 0x{:04X} [{} bytes] {}",
                rw,
                self.label(),
                self.address,
                self.transfer_size(),
                self.mode()
            ),
            (Category::RegisterControl, None) => write!(
                f,
                "CMD53 {}: {} | Addr:0x{:04X} Cnt:{} {}",
                rw,
                self.label(),
                self.address,
                self.count,
                self.mode()
            ),
        }
    }
}
