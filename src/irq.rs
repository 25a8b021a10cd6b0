//! Decoding of the INT1 interrupt status word.

use std::fmt;

use bitvec::prelude::*;

/// A named source in the INT1 interrupt registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterruptName {
    /// A pager has data ready. Bits\[13:0\].
    Pager(u8),

    /// TX status is available. Bit\[15\].
    TxStatus,

    /// Beacon interrupt of the given VIF. Bits\[24:17\].
    Beacon(u8),

    /// NDP probe request interrupt of the given VIF. Bits\[26:25\].
    Ndp(u8),

    /// The firmware has stopped the hardware. Bit\[27\].
    HwStop,
}

impl fmt::Display for InterruptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pager(n) => write!(f, "Pager{}", n),
            Self::TxStatus => f.write_str("TxStatus"),
            Self::Beacon(vif) => write!(f, "Beacon{}", vif),
            Self::Ndp(vif) => write!(f, "NDP{}", vif),
            Self::HwStop => f.write_str("HW_STOP"),
        }
    }
}

/// Bit position to [`InterruptName`] mapping. Positions without a name
/// are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptBitTable {
    names: [Option<InterruptName>; 32],
}

impl InterruptBitTable {
    /// The MM6108 INT1 layout. Bits 14, 16 and 31:28 are reserved.
    pub const MM6108: Self = Self {
        names: mm6108_names(),
    };

    /// The name of `bit`. `None` if reserved or out of range.
    pub fn name(&self, bit: usize) -> Option<InterruptName> {
        self.names.get(bit).copied().flatten()
    }

    /// Returns the names of all set, non-reserved bits in `value`,
    /// lowest bit first.
    pub fn decode(&self, value: u32) -> Vec<InterruptName> {
        value
            .view_bits::<Lsb0>()
            .iter_ones()
            .filter_map(|bit| self.name(bit))
            .collect()
    }
}

const fn mm6108_names() -> [Option<InterruptName>; 32] {
    let mut names = [None; 32];

    let mut bit = 0;
    while bit < 14 {
        names[bit] = Some(InterruptName::Pager(bit as u8));
        bit += 1;
    }

    names[15] = Some(InterruptName::TxStatus);

    let mut vif = 0;
    while vif < 8 {
        names[17 + vif] = Some(InterruptName::Beacon(vif as u8));
        vif += 1;
    }

    names[25] = Some(InterruptName::Ndp(0));
    names[26] = Some(InterruptName::Ndp(1));
    names[27] = Some(InterruptName::HwStop);

    names
}

/// Renders a decoded name set as a comma-separated list, or `None` if
/// empty.
pub struct NameList<'a>(pub &'a [InterruptName]);

impl fmt::Display for NameList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("None");
        }

        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", name)?;
        }

        Ok(())
    }
}
