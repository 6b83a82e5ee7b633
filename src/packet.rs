//! Decoding of raw 3-byte relative motion packets.

/// Number of bytes in one motion packet: status, dx, dy.
pub const PACKET_LEN: usize = 3;

/// Signed motion carried by one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionDelta {
    pub dx: i32,
    pub dy: i32,
}

/// Two's-complement interpretation of an 8-bit magnitude
pub fn to_signed(n: u8) -> i32 {
    n as i8 as i32
}

/// Decode one packet. The status byte is reserved and ignored.
pub fn decode_packet(packet: [u8; PACKET_LEN]) -> MotionDelta {
    let [_status, raw_dx, raw_dy] = packet;
    MotionDelta {
        dx: to_signed(raw_dx),
        dy: to_signed(raw_dy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_signed_boundaries() {
        assert_eq!(to_signed(0), 0);
        assert_eq!(to_signed(1), 1);
        assert_eq!(to_signed(127), 127);
        assert_eq!(to_signed(128), -128);
        assert_eq!(to_signed(254), -2);
        assert_eq!(to_signed(255), -1);
    }

    #[test]
    fn test_to_signed_matches_reference_formula() {
        for n in 0..=u8::MAX {
            let expected = if n < 128 { n as i32 } else { n as i32 - 256 };
            assert_eq!(to_signed(n), expected, "byte {}", n);
        }
    }

    #[test]
    fn test_decode_ignores_status() {
        let a = decode_packet([0x08, 1, 254]);
        let b = decode_packet([0xFF, 1, 254]);
        assert_eq!(a, MotionDelta { dx: 1, dy: -2 });
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_applies_sign_per_axis() {
        assert_eq!(decode_packet([0, 128, 5]), MotionDelta { dx: -128, dy: 5 });
        assert_eq!(decode_packet([0, 0, 0]), MotionDelta::default());
    }
}
