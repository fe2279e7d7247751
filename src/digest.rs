//! Digest: the 16-byte map key, plus a pass-through hasher for host maps.

use bytemuck::{Pod, Zeroable};
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};

/// Fixed 16-byte content digest.
///
/// Byte layout is portable: bytes `0..8` hold the first 64-bit half and
/// bytes `8..16` the second, each little-endian. Equality is exact over all
/// 16 bytes. There is deliberately no ordering.
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Digest([u8; 16]);

impl Digest {
    pub const LEN: usize = 16;

    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Digest(bytes)
    }

    #[inline]
    pub fn from_halves(h1: u64, h2: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&h1.to_le_bytes());
        bytes[8..].copy_from_slice(&h2.to_le_bytes());
        Digest(bytes)
    }

    #[inline]
    pub fn halves(&self) -> (u64, u64) {
        (self.word64(0), self.word64(1))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    #[inline]
    pub fn into_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Equality without an early exit: every byte is inspected regardless of
    /// where the first difference is.
    #[inline]
    pub fn ct_eq(&self, other: &Digest) -> bool {
        let diff = self
            .0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        core::hint::black_box(diff) == 0
    }

    /// First four bytes, little-endian. Input to the table's index step.
    #[inline]
    pub fn bucket_hint(&self) -> u32 {
        self.word32(0)
    }

    /// XOR of the four 32-bit lanes.
    #[inline]
    pub fn fold_u32(&self) -> u32 {
        self.word32(0) ^ self.word32(1) ^ self.word32(2) ^ self.word32(3)
    }

    #[inline]
    fn word32(&self, i: usize) -> u32 {
        let mut w = [0u8; 4];
        w.copy_from_slice(&self.0[i * 4..i * 4 + 4]);
        u32::from_le_bytes(w)
    }

    #[inline]
    fn word64(&self, i: usize) -> u64 {
        let mut w = [0u8; 8];
        w.copy_from_slice(&self.0[i * 8..i * 8 + 8]);
        u64::from_le_bytes(w)
    }
}

impl From<[u8; 16]> for Digest {
    fn from(bytes: [u8; 16]) -> Self {
        Digest(bytes)
    }
}

impl From<Digest> for [u8; 16] {
    fn from(d: Digest) -> Self {
        d.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Hash for Digest {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.0);
    }
}

impl fmt::LowerHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({:x})", self)
    }
}

/// Hasher for keys that are already uniformly mixed digests.
///
/// A single write of at least eight bytes yields those eight bytes as the
/// hash. Anything else is folded in 8-byte chunks so non-digest keys still
/// spread, though that is not what this hasher is for.
#[derive(Default, Clone, Copy, Debug)]
pub struct DigestHasher {
    state: u64,
    written: bool,
}

impl Hasher for DigestHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        if !self.written && bytes.len() >= 8 {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[..8]);
            self.state = u64::from_le_bytes(w);
            self.written = true;
            return;
        }
        for chunk in bytes.chunks(8) {
            let mut w = [0u8; 8];
            w[..chunk.len()].copy_from_slice(chunk);
            let k = u64::from_le_bytes(w);
            self.state = crate::murmur3::fmix64(self.state.rotate_left(5) ^ k);
        }
        self.written = true;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// `BuildHasher` producing [`DigestHasher`]s.
#[derive(Default, Clone, Copy, Debug)]
pub struct DigestBuildHasher;

impl BuildHasher for DigestBuildHasher {
    type Hasher = DigestHasher;

    #[inline]
    fn build_hasher(&self) -> DigestHasher {
        DigestHasher::default()
    }
}

/// Single-threaded digest map, as produced by `DigestMap::to_host_map`.
pub type HostDigestMap<V> = hashbrown::HashMap<Digest, V, DigestBuildHasher>;
