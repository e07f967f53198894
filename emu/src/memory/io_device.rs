use std::fmt;

/// Size of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    Byte,
    HalfWord,
    Word,
}

impl AccessWidth {
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Byte => "byte",
            Self::HalfWord => "halfword",
            Self::Word => "word",
        })
    }
}

/// A device mapped somewhere in the address space.
///
/// Addresses are absolute and already aligned to the access width. A device
/// only needs to implement the widths it natively supports: the bus builds
/// words out of halfwords and halfwords out of bytes. `None` from a read or
/// `false` from a write means the width is not handled.
pub trait IoDevice {
    fn read_8(&mut self, address: u32) -> Option<u8>;

    fn write_8(&mut self, address: u32, value: u8) -> bool;

    fn read_16(&mut self, _address: u32) -> Option<u16> {
        None
    }

    fn read_32(&mut self, _address: u32) -> Option<u32> {
        None
    }

    fn write_16(&mut self, _address: u32, _value: u16) -> bool {
        false
    }

    fn write_32(&mut self, _address: u32, _value: u32) -> bool {
        false
    }

    /// Back to the power-on state.
    fn reset(&mut self) {}
}
