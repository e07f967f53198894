//! Memory-mapped register cell shared by every control/status register.
//!
//! A register is 1, 2 or 4 bytes wide and carries:
//! - an access control (write-only registers read back as 0, read-only ones
//!   drop writes),
//! - a write mask selecting the bits software may change,
//! - a write behaviour: plain overwrite or write-1-to-clear (IF style),
//! - a power-on value restored by [`IoRegister::reset`].
//!
//! Devices needing side effects wrap the cell: they forward the access here and
//! react to the new value afterwards. Hardware-side updates bypass the mask
//! through [`IoRegister::set_value`].

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::memory::io_device::AccessWidth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoRegisterAccessControl {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteBehavior {
    Overwrite,
    /// Each 1 written clears the matching bit, 0 leaves it alone.
    ClearOnWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoRegister {
    value: u32,
    power_on: u32,
    width: u8,
    write_mask: u32,
    access: IoRegisterAccessControl,
    behavior: WriteBehavior,
}

impl IoRegister {
    #[must_use]
    pub const fn new(width: AccessWidth, access: IoRegisterAccessControl) -> Self {
        let bytes = width.bytes();
        let full = if bytes == 4 {
            u32::MAX
        } else {
            (1 << (bytes * 8)) - 1
        };
        Self {
            value: 0,
            power_on: 0,
            width: bytes as u8,
            write_mask: full,
            access,
            behavior: WriteBehavior::Overwrite,
        }
    }

    /// Restricts software writes to the bits set in `mask`.
    #[must_use]
    pub const fn with_mask(mut self, mask: u32) -> Self {
        self.write_mask &= mask;
        self
    }

    #[must_use]
    pub const fn with_power_on(mut self, value: u32) -> Self {
        self.power_on = value;
        self.value = value;
        self
    }

    #[must_use]
    pub const fn clear_on_write(mut self) -> Self {
        self.behavior = WriteBehavior::ClearOnWrite;
        self
    }

    /// Value as seen by software.
    #[must_use]
    pub fn read(&self) -> u32 {
        match self.access {
            IoRegisterAccessControl::Read | IoRegisterAccessControl::ReadWrite => self.value,
            IoRegisterAccessControl::Write => {
                tracing::trace!("read of a write-only register");
                0
            }
        }
    }

    pub fn write(&mut self, value: u32) {
        self.write_lanes(value, self.write_mask);
    }

    #[must_use]
    pub fn read_byte(&self, byte_nth: u8) -> u8 {
        if byte_nth >= self.width {
            return 0;
        }
        self.read().get_byte(byte_nth)
    }

    pub fn write_byte(&mut self, byte_nth: u8, value: u8) {
        if byte_nth >= self.width {
            return;
        }
        let lane = 0xFF_u32 << (8 * u32::from(byte_nth));
        self.write_lanes(u32::from(value) << (8 * u32::from(byte_nth)), self.write_mask & lane);
    }

    fn write_lanes(&mut self, value: u32, mask: u32) {
        if self.access == IoRegisterAccessControl::Read {
            tracing::trace!("write of 0x{value:X} to a read-only register dropped");
            return;
        }

        self.value = match self.behavior {
            WriteBehavior::Overwrite => (self.value & !mask) | (value & mask),
            WriteBehavior::ClearOnWrite => self.value & !(value & mask),
        };
    }

    /// Stored value regardless of access control.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Hardware-side update, bypassing mask and behaviour.
    pub const fn set_value(&mut self, value: u32) {
        self.value = value;
    }

    pub const fn reset(&mut self) {
        self.value = self.power_on;
    }
}
