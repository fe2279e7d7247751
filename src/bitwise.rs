//! Chunked bitwise equality for plain-old-data values.

use bytemuck::Pod;

/// Compares two values byte for byte.
///
/// Both values are viewed as raw bytes and compared in 8-byte words, then a
/// trailing 4-, 2- and 1-byte chunk as the size requires. `Pod` rules out
/// padding, so every byte compared is initialized.
pub fn bitwise_eq<T: Pod>(a: &T, b: &T) -> bool {
    let a = bytemuck::bytes_of(a);
    let b = bytemuck::bytes_of(b);

    let mut a8 = a.chunks_exact(8);
    let mut b8 = b.chunks_exact(8);
    let mut equal = true;
    for (x, y) in (&mut a8).zip(&mut b8) {
        equal &= word(x) == word(y);
    }

    let (mut ra, mut rb) = (a8.remainder(), b8.remainder());
    for width in [4usize, 2, 1] {
        if ra.len() >= width {
            equal &= ra[..width] == rb[..width];
            ra = &ra[width..];
            rb = &rb[width..];
        }
    }
    equal
}

#[inline(always)]
fn word(chunk: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(chunk);
    u64::from_ne_bytes(w)
}
