//! Byte-order conversion for FITS pixel data.
//!
//! FITS stores binary data big-endian. The gateway hands pixel buffers to the
//! streamer in native order, and the streamer converts back to big-endian
//! before writing, so both directions are provided. On big-endian hosts every
//! conversion is a no-op.

/// Convert a pixel buffer from big-endian (stored) to native order in place.
///
/// The element width is `|bitpix| / 8`; single-byte data is untouched.
/// Floating-point types are swapped as same-width integers.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of the element width.
pub fn to_native(buf: &mut [u8], bitpix: i64) {
    swap_pixel_bytes(buf, bitpix);
}

/// Convert a pixel buffer from native to big-endian (wire) order in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of the element width.
pub fn to_big_endian(buf: &mut [u8], bitpix: i64) {
    swap_pixel_bytes(buf, bitpix);
}

// Byte swapping is an involution, so both directions share one body.
fn swap_pixel_bytes(buf: &mut [u8], bitpix: i64) {
    let width = (bitpix.unsigned_abs() as usize) / 8;
    if width <= 1 || cfg!(target_endian = "big") {
        return;
    }
    assert!(
        buf.len().is_multiple_of(width),
        "buffer length must be a multiple of the pixel width"
    );
    for chunk in buf.chunks_exact_mut(width) {
        chunk.reverse();
    }
}

/// Read a big-endian `i32` from the first 4 bytes of the slice.
#[inline]
pub fn read_i32_be(buf: &[u8]) -> i32 {
    i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a big-endian `f64` from the first 8 bytes of the slice.
#[inline]
pub fn read_f64_be(buf: &[u8]) -> f64 {
    f64::from_be_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_untouched_for_bitpix_8() {
        let mut buf = [1u8, 2, 3];
        to_big_endian(&mut buf, 8);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn i16_round_trip() {
        let vals: [i16; 3] = [-1, 256, 12345];
        let mut buf: Vec<u8> = vals.iter().flat_map(|v| v.to_ne_bytes()).collect();
        to_big_endian(&mut buf, 16);
        for (chunk, v) in buf.chunks_exact(2).zip(vals) {
            assert_eq!(i16::from_be_bytes([chunk[0], chunk[1]]), v);
        }
        to_native(&mut buf, 16);
        for (chunk, v) in buf.chunks_exact(2).zip(vals) {
            assert_eq!(i16::from_ne_bytes([chunk[0], chunk[1]]), v);
        }
    }

    #[test]
    fn f32_swaps_as_integer() {
        let v = 1.5f32;
        let mut buf = v.to_ne_bytes().to_vec();
        to_big_endian(&mut buf, -32);
        assert_eq!(buf, v.to_be_bytes());
    }

    #[test]
    fn f64_round_trip() {
        let v = -273.15f64;
        let mut buf = v.to_ne_bytes().to_vec();
        to_big_endian(&mut buf, -64);
        assert_eq!(buf, v.to_be_bytes());
        to_native(&mut buf, -64);
        assert_eq!(f64::from_ne_bytes(buf.try_into().unwrap()), v);
    }

    #[test]
    fn i64_conversion() {
        let v = 0x0102030405060708i64;
        let mut buf = v.to_ne_bytes().to_vec();
        to_big_endian(&mut buf, 64);
        assert_eq!(buf, v.to_be_bytes());
    }

    #[test]
    #[should_panic(expected = "multiple of the pixel width")]
    #[cfg(target_endian = "little")]
    fn ragged_buffer_panics() {
        let mut buf = [0u8; 5];
        to_big_endian(&mut buf, 32);
    }

    #[test]
    fn be_read_helpers() {
        assert_eq!(read_i32_be(&[0, 0, 1, 0]), 256);
        assert_eq!(read_f64_be(&1.25f64.to_be_bytes()), 1.25);
    }
}
