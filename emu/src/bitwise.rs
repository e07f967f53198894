use std::ops::RangeInclusive;

/// Bit helpers for the unsigned words moved around by the core.
/// Indexes go from lsb to msb (right to left).
pub trait Bits: Copy {
    const WIDTH: u8;

    fn is_bit_on(self, bit_idx: u8) -> bool;

    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    #[must_use]
    fn with_bit(self, bit_idx: u8, value: bool) -> Self;

    fn get_byte(self, byte_nth: u8) -> u8;

    #[must_use]
    fn with_byte(self, byte_nth: u8, value: u8) -> Self;

    fn is_bit_off(self, bit_idx: u8) -> bool {
        !self.is_bit_on(bit_idx)
    }

    fn get_bit(self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    fn set_bit(&mut self, bit_idx: u8, value: bool) {
        *self = self.with_bit(bit_idx, value);
    }

    fn set_bit_on(&mut self, bit_idx: u8) {
        self.set_bit(bit_idx, true);
    }

    fn set_bit_off(&mut self, bit_idx: u8) {
        self.set_bit(bit_idx, false);
    }

    fn set_byte(&mut self, byte_nth: u8, value: u8) {
        *self = self.with_byte(byte_nth, value);
    }

    /// True when every bit in the range is set.
    fn are_bits_on(self, bits_range: RangeInclusive<u8>) -> bool {
        bits_range.into_iter().all(|bit| self.is_bit_on(bit))
    }
}

macro_rules! impl_bits {
    ($($ty:ty),*) => {
        $(
            impl Bits for $ty {
                const WIDTH: u8 = <$ty>::BITS as u8;

                fn is_bit_on(self, bit_idx: u8) -> bool {
                    debug_assert!(bit_idx < Self::WIDTH);
                    (self >> bit_idx) & 1 == 1
                }

                fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let end = *bits_range.end();
                    debug_assert!(start <= end && end < Self::WIDTH);

                    let length = u32::from(end - start + 1);
                    let mask = <$ty>::MAX.checked_shr(<$ty>::BITS - length).unwrap_or(0);
                    (self >> start) & mask
                }

                fn with_bit(self, bit_idx: u8, value: bool) -> Self {
                    debug_assert!(bit_idx < Self::WIDTH);
                    let mask: $ty = 1 << bit_idx;
                    if value { self | mask } else { self & !mask }
                }

                fn get_byte(self, byte_nth: u8) -> u8 {
                    debug_assert!(byte_nth < Self::WIDTH / 8);
                    self.to_le_bytes()[usize::from(byte_nth)]
                }

                fn with_byte(self, byte_nth: u8, value: u8) -> Self {
                    debug_assert!(byte_nth < Self::WIDTH / 8);
                    let mut bytes = self.to_le_bytes();
                    bytes[usize::from(byte_nth)] = value;
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_bits!(u8, u16, u32, u64);

/// Sign-extends the lowest `bits` bits of `value` to a full word.
#[must_use]
pub const fn sign_extended(value: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_bit_on_off() {
        let value: u32 = 0b1010;
        assert!(value.is_bit_on(1));
        assert!(value.is_bit_off(0));
        assert!(value.is_bit_on(3));
        assert!(0x8000_0000_u32.is_bit_on(31));
    }

    #[test]
    fn check_set_bit() {
        let mut value: u16 = 0;
        value.set_bit_on(15);
        assert_eq!(value, 0x8000);
        value.set_bit(0, true);
        assert_eq!(value, 0x8001);
        value.set_bit_off(15);
        assert_eq!(value, 1);
    }

    #[test]
    fn check_get_bits() {
        let value: u32 = 0xE12F_FF1E;
        assert_eq!(value.get_bits(28..=31), 0xE);
        assert_eq!(value.get_bits(0..=3), 0xE);
        assert_eq!(value.get_bits(4..=27), 0x12F_FF1);
        assert_eq!(value.get_bits(0..=31), value);
        assert_eq!(0xFF_u8.get_bits(0..=7), 0xFF);
    }

    #[test]
    fn check_bytes() {
        let mut value: u32 = 0x1234_5678;
        assert_eq!(value.get_byte(0), 0x78);
        assert_eq!(value.get_byte(3), 0x12);
        value.set_byte(2, 0xAB);
        assert_eq!(value, 0x12AB_5678);
    }

    #[test]
    fn check_are_bits_on() {
        assert!(0b0111_0000_u8.are_bits_on(4..=6));
        assert!(!0b0101_0000_u8.are_bits_on(4..=6));
    }

    #[test]
    fn check_random_byte_round_trip() {
        for _ in 0..64 {
            let original: u32 = rand::random();
            let mut rebuilt = 0_u32;
            for idx in 0..4 {
                rebuilt.set_byte(idx, original.get_byte(idx));
            }
            assert_eq!(rebuilt, original);
        }
    }

    #[test]
    fn check_sign_extended() {
        assert_eq!(sign_extended(0x80_0000, 24), 0xFF80_0000);
        assert_eq!(sign_extended(0x7F_FFFF, 24), 0x007F_FFFF);
        assert_eq!(sign_extended(0x80, 8), 0xFFFF_FF80);
        assert_eq!(sign_extended(0x400, 11), 0xFFFF_FC00);
    }
}
