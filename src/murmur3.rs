//! MurmurHash3 family over byte slices.
//!
//! MurmurHash3 was written by Austin Appleby and placed in the public
//! domain. `x64_128` is the content digest used as the map key; the other
//! variants share its constants and structure.
//!
//! All multi-byte reads are little-endian and go through byte slices, so
//! the input may have any alignment and the output is identical across
//! platforms.

use crate::digest::Digest;

/// Seed used by [`hash`]. Pass a different one through [`hash_with_seed`].
pub const DEFAULT_SEED: u32 = 0;

const C1_64: u64 = 0x87c3_7b91_1142_53d5;
const C2_64: u64 = 0x4cf5_ad43_2745_937f;

const C1_32: u32 = 0xcc9e_2d51;
const C2_32: u32 = 0x1b87_3593;

const X86_128_C: [u32; 4] = [0x239b_961b, 0xab0e_9789, 0x38b3_4ae5, 0xa1e3_8b93];

/// 128-bit digest of `data` with [`DEFAULT_SEED`].
#[inline]
pub fn hash(data: &[u8]) -> Digest {
    hash_with_seed(data, DEFAULT_SEED)
}

/// 128-bit digest of `data` with an explicit seed.
#[inline]
pub fn hash_with_seed(data: &[u8], seed: u32) -> Digest {
    let [h1, h2] = x64_128(data, seed);
    Digest::from_halves(h1, h2)
}

/// Writes the 16-byte digest of `data` into `out`.
#[inline]
pub fn hash_into(data: &[u8], out: &mut [u8; 16]) {
    *out = hash(data).into_bytes();
}

#[inline(always)]
pub fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[inline(always)]
pub fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

#[inline(always)]
fn read_u64(b: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(&b[..8]);
    u64::from_le_bytes(w)
}

#[inline(always)]
fn read_u32(b: &[u8]) -> u32 {
    let mut w = [0u8; 4];
    w.copy_from_slice(&b[..4]);
    u32::from_le_bytes(w)
}

// Builds a partial little-endian word from at most 8 trailing bytes,
// highest byte first.
#[inline(always)]
fn tail_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |k, &b| (k << 8) | u64::from(b))
}

#[inline(always)]
fn tail_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |k, &b| (k << 8) | u32::from(b))
}

#[inline(always)]
fn mix_k1_64(k1: u64) -> u64 {
    k1.wrapping_mul(C1_64).rotate_left(31).wrapping_mul(C2_64)
}

#[inline(always)]
fn mix_k2_64(k2: u64) -> u64 {
    k2.wrapping_mul(C2_64).rotate_left(33).wrapping_mul(C1_64)
}

/// MurmurHash3_x64_128. Returns `[h1, h2]`.
pub fn x64_128(data: &[u8], seed: u32) -> [u64; 2] {
    let len = data.len() as u64;
    let mut h1 = u64::from(seed);
    let mut h2 = u64::from(seed);

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        let k1 = read_u64(&block[0..8]);
        let k2 = read_u64(&block[8..16]);

        h1 ^= mix_k1_64(k1);
        h1 = h1.rotate_left(27).wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        h2 ^= mix_k2_64(k2);
        h2 = h2.rotate_left(31).wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    if tail.len() > 8 {
        h2 ^= mix_k2_64(tail_u64(&tail[8..]));
    }
    if !tail.is_empty() {
        h1 ^= mix_k1_64(tail_u64(&tail[..tail.len().min(8)]));
    }

    h1 ^= len;
    h2 ^= len;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    [h1, h2]
}

/// 64-bit variant: the first half of [`x64_128`].
#[inline]
pub fn x64_64(data: &[u8], seed: u32) -> u64 {
    x64_128(data, seed)[0]
}

/// MurmurHash3_x86_32.
pub fn x86_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;

    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k1 = read_u32(block)
            .wrapping_mul(C1_32)
            .rotate_left(15)
            .wrapping_mul(C2_32);
        h1 ^= k1;
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        h1 ^= tail_u32(tail)
            .wrapping_mul(C1_32)
            .rotate_left(15)
            .wrapping_mul(C2_32);
    }

    // The reference folds only the low 32 bits of the length.
    h1 ^= data.len() as u32;
    fmix32(h1)
}

/// MurmurHash3_x86_128. Returns the four 32-bit lanes in output order.
pub fn x86_128(data: &[u8], seed: u32) -> [u32; 4] {
    const ROT: [u32; 4] = [15, 16, 17, 18];
    const H_ROT: [u32; 4] = [19, 17, 15, 13];
    const H_ADD: [u32; 4] = [0x561c_cd1b, 0x0bca_a747, 0x96cd_1c35, 0x32ac_3b17];

    let c = X86_128_C;
    let mix = |lane: usize, k: u32| {
        k.wrapping_mul(c[lane])
            .rotate_left(ROT[lane])
            .wrapping_mul(c[(lane + 1) % 4])
    };

    let mut h = [seed; 4];

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        for lane in 0..4 {
            let k = read_u32(&block[lane * 4..]);
            h[lane] ^= mix(lane, k);
            h[lane] = h[lane]
                .rotate_left(H_ROT[lane])
                .wrapping_add(h[(lane + 1) % 4])
                .wrapping_mul(5)
                .wrapping_add(H_ADD[lane]);
        }
    }

    let tail = blocks.remainder();
    for lane in (0..4).rev() {
        let start = lane * 4;
        if tail.len() > start {
            let end = tail.len().min(start + 4);
            h[lane] ^= mix(lane, tail_u32(&tail[start..end]));
        }
    }

    let len = data.len() as u32;
    for lane in h.iter_mut() {
        *lane ^= len;
    }

    cross_add(&mut h);
    for lane in h.iter_mut() {
        *lane = fmix32(*lane);
    }
    cross_add(&mut h);

    h
}

#[inline(always)]
fn cross_add(h: &mut [u32; 4]) {
    h[0] = h[0]
        .wrapping_add(h[1])
        .wrapping_add(h[2])
        .wrapping_add(h[3]);
    h[1] = h[1].wrapping_add(h[0]);
    h[2] = h[2].wrapping_add(h[0]);
    h[3] = h[3].wrapping_add(h[0]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(d: Digest) -> String {
        format!("{}", d)
    }

    /// Invariant: the well-known public vector for x64_128 is reproduced.
    #[test]
    fn x64_128_reference_vector() {
        let d = hash(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(hex(d), "6c1b07bc7bbc4be347939ac4a93c437a");
    }

    /// Invariant: empty input with seed 0 keeps every lane at zero.
    #[test]
    fn empty_input_seed_zero_is_all_zero() {
        assert_eq!(hash(&[]).into_bytes(), [0u8; 16]);
        assert_eq!(x86_32(&[], 0), 0);
        assert_eq!(x86_128(&[], 0), [0; 4]);
    }

    /// Invariant: the seed participates even when there are no input bytes.
    #[test]
    fn empty_input_nonzero_seed() {
        assert_eq!(
            hex(hash_with_seed(&[], 1)),
            "b55cff6ee5ab10468335f878aa2d6251"
        );
        assert_eq!(x86_32(&[], 1), 0x514e_28b7);
    }

    #[test]
    fn x86_32_reference_vectors() {
        assert_eq!(x86_32(b"hello", 0), 0x248b_fa47);
        assert_eq!(x86_32(b"hello", 1), 0xbb4a_bcad);
        assert_eq!(
            x86_32(b"The quick brown fox jumps over the lazy dog", 0),
            0x2e4f_f723
        );
    }

    /// Invariant: tails of every length 0..=15 on top of full blocks are
    /// consumed (each extra byte changes the digest).
    #[test]
    fn every_tail_length_contributes() {
        let data: Vec<u8> = (0u8..48).collect();
        let mut seen = std::collections::HashSet::new();
        for n in 0..=data.len() {
            assert!(seen.insert(hash(&data[..n])), "collision at length {n}");
        }
    }

    #[test]
    fn multi_block_vectors() {
        let sixteen: Vec<u8> = (0u8..16).collect();
        let thirty_one: Vec<u8> = (0u8..31).collect();
        assert_eq!(hex(hash(&sixteen)), "303f9091b524494445e82f76566490ab");
        assert_eq!(hex(hash(&thirty_one)), "94d02ca3e1d33d05905400b4ef9ae59e");
    }

    #[test]
    fn x64_64_is_first_half() {
        let data = b"hello";
        assert_eq!(x64_64(data, 7), x64_128(data, 7)[0]);
    }

    #[test]
    fn hash_into_matches_hash() {
        let mut out = [0xAAu8; 16];
        hash_into(b"hello", &mut out);
        assert_eq!(out, hash(b"hello").into_bytes());
        assert_eq!(
            out,
            [
                0x02, 0x9b, 0xbd, 0x41, 0xb3, 0xa7, 0xd8, 0xcb, 0x19, 0x1d, 0xae, 0x48, 0x6a,
                0x90, 0x1e, 0x5b
            ]
        );
    }

    /// Invariant: unaligned views of the same bytes hash identically.
    #[test]
    fn alignment_independent() {
        let mut buf = vec![0u8; 64];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i * 7) as u8;
        }
        let base = hash(&buf[0..40]);
        let mut shifted = vec![0u8; 1];
        shifted.extend_from_slice(&buf[0..40]);
        assert_eq!(hash(&shifted[1..]), base);
    }

    #[test]
    fn fmix_zero_is_fixed_point() {
        assert_eq!(fmix32(0), 0);
        assert_eq!(fmix64(0), 0);
        assert_ne!(fmix32(1), 1);
    }
}
