//! Function and address classification.

use std::fmt;

/// Interrupt status register of the MM6108.
pub const INT1_STS: u32 = 0x6050;

/// Interrupt set register of the MM6108.
pub const INT1_SET: u32 = 0x6054;

/// Interrupt clear register of the MM6108.
pub const INT1_CLR: u32 = 0x6058;

/// The kind of traffic a transaction carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Function 0; the Card Common Control Registers.
    CardControl,

    /// Small register accesses, including the interrupt registers.
    RegisterControl,

    /// Function 2 data transfers.
    BulkData,
}

/// The two interrupt registers whose payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IrqRegister {
    /// [`INT1_STS`].
    Status,

    /// [`INT1_CLR`].
    Clear,
}

impl IrqRegister {
    /// Returns the interrupt register at `address`, if any.
    pub fn at(address: u32) -> Option<Self> {
        match address {
            INT1_STS => Some(Self::Status),
            INT1_CLR => Some(Self::Clear),
            _ => None,
        }
    }
}

/// Classifies a transaction. The function number takes precedence over
/// the interrupt register addresses, which take precedence over the bulk
/// data function.
pub fn classify(function: u8, address: u32) -> Category {
    match (function, IrqRegister::at(address)) {
        (0, _) => Category::CardControl,
        (_, Some(_)) => Category::RegisterControl,
        (2, None) => Category::BulkData,
        (_, None) => Category::RegisterControl,
    }
}

/// Descriptions of the SDIO functions used by the MM6108 driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FunctionLabel {
    CardControl,
    RegisterControl,
    BulkData,
}

impl FunctionLabel {
    /// `None` for functions 3 to 7.
    pub fn from_function(function: u8) -> Option<Self> {
        match function {
            0 => Some(Self::CardControl),
            1 => Some(Self::RegisterControl),
            2 => Some(Self::BulkData),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CardControl => "Card Control (CCCR)",
            Self::RegisterControl => "Registers/Control (≤4B)",
            Self::BulkData => "Bulk Data (>4B)",
        })
    }
}

/// Symbolic names of known register and buffer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressName {
    Int1Sts,
    Int1Set,
    Int1Clr,
    DataBuf,
}

impl fmt::Display for AddressName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int1Sts => "INT1_STS",
            Self::Int1Set => "INT1_SET",
            Self::Int1Clr => "INT1_CLR",
            Self::DataBuf => "DATA_BUF",
        })
    }
}

/// Address to name mapping. Annotation only: classification never
/// consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownAddressTable {
    entries: &'static [(u32, AddressName)],
}

impl KnownAddressTable {
    pub const fn new(entries: &'static [(u32, AddressName)]) -> Self {
        Self { entries }
    }

    /// Registers and data buffers seen in MM6108 captures.
    pub const MM6108: Self = Self::new(&[
        (INT1_STS, AddressName::Int1Sts),
        (INT1_SET, AddressName::Int1Set),
        (INT1_CLR, AddressName::Int1Clr),
        (0xC214, AddressName::DataBuf),
        (0xC310, AddressName::DataBuf),
        (0xBF40, AddressName::DataBuf),
        (0xC110, AddressName::DataBuf),
    ]);

    pub fn lookup(&self, address: u32) -> Option<AddressName> {
        self.entries
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, name)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_control_wins() {
        for address in [0, INT1_STS, INT1_CLR, 0x9420, 0x1_FFFF].iter() {
            assert_eq!(classify(0, *address), Category::CardControl);
        }
    }

    #[test]
    fn interrupt_registers() {
        assert_eq!(classify(1, INT1_STS), Category::RegisterControl);
        assert_eq!(IrqRegister::at(INT1_STS), Some(IrqRegister::Status));

        assert_eq!(classify(1, INT1_CLR), Category::RegisterControl);
        assert_eq!(IrqRegister::at(INT1_CLR), Some(IrqRegister::Clear));

        // address takes precedence over the bulk function
        assert_eq!(classify(2, INT1_STS), Category::RegisterControl);
        assert_eq!(IrqRegister::at(INT1_SET), None);
    }

    #[test]
    fn bulk_and_fallback() {
        assert_eq!(classify(2, 0x9420), Category::BulkData);
        assert_eq!(classify(1, 0x9420), Category::RegisterControl);
        assert_eq!(classify(1, 0xC214), Category::RegisterControl);
        assert_eq!(classify(7, 0x0000), Category::RegisterControl);
    }

    #[test]
    fn labels() {
        assert_eq!(
            FunctionLabel::from_function(1).unwrap().to_string(),
            "Registers/Control (≤4B)"
        );
        assert_eq!(FunctionLabel::from_function(3), None);

        let table = KnownAddressTable::MM6108;
        assert_eq!(table.lookup(INT1_SET), Some(AddressName::Int1Set));
        assert_eq!(table.lookup(0xBF40), Some(AddressName::DataBuf));
        assert_eq!(table.lookup(0x9420), None);
        assert_eq!(AddressName::Int1Clr.to_string(), "INT1_CLR");
    }
}
