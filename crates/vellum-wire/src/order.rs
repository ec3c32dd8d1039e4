use std::str::FromStr;

/// Byte order of multi-byte values on the wire.
///
/// The client and server must agree. `Native` matches the host the server runs
/// on, which is what clients on the same machine send by default.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ByteOrder {
    #[default]
    Native,
    Little,
    Big,
}

impl ByteOrder {
    /// True when wire bytes can be used in place without swapping.
    #[inline]
    pub fn is_native(self) -> bool {
        match self {
            Self::Native => true,
            Self::Little => cfg!(target_endian = "little"),
            Self::Big => cfg!(target_endian = "big"),
        }
    }

    #[inline]
    pub fn u16_from(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Native => u16::from_ne_bytes(b),
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u32_from(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Native => u32::from_ne_bytes(b),
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u64_from(self, b: [u8; 8]) -> u64 {
        match self {
            Self::Native => u64::from_ne_bytes(b),
            Self::Little => u64::from_le_bytes(b),
            Self::Big => u64::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u16_to(self, v: u16) -> [u8; 2] {
        match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u32_to(self, v: u32) -> [u8; 4] {
        match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u64_to(self, v: u64) -> [u8; 8] {
        match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }

    /// Swaps every 4-byte word in place when the wire order differs from the host.
    ///
    /// Bulk float payloads are read straight into GPU-visible memory, which must
    /// hold host-order values. The same swap converts back for sending.
    pub fn swap_words_in_place(self, bytes: &mut [u8]) {
        if self.is_native() {
            return;
        }
        debug_assert!(bytes.len() % 4 == 0);
        for word in bytes.chunks_exact_mut(4) {
            word.reverse();
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            other => Err(format!("unknown byte order '{other}' (expected native, little or big)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_never_swaps() {
        let mut b = [1u8, 2, 3, 4];
        ByteOrder::Native.swap_words_in_place(&mut b);
        assert_eq!(b, [1, 2, 3, 4]);
    }

    #[test]
    fn foreign_order_swaps_each_word() {
        let foreign = if cfg!(target_endian = "little") { ByteOrder::Big } else { ByteOrder::Little };
        let mut b = [1u8, 2, 3, 4, 5, 6, 7, 8];
        foreign.swap_words_in_place(&mut b);
        assert_eq!(b, [4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn big_endian_u32() {
        assert_eq!(ByteOrder::Big.u32_from([0, 0, 1, 2]), 0x0102);
        assert_eq!(ByteOrder::Big.u32_to(0x0102), [0, 0, 1, 2]);
    }

    #[test]
    fn parse_names() {
        assert_eq!("native".parse::<ByteOrder>(), Ok(ByteOrder::Native));
        assert_eq!("LE".parse::<ByteOrder>(), Ok(ByteOrder::Little));
        assert!("middle".parse::<ByteOrder>().is_err());
    }
}
