//! digest-table: a concurrent, fixed-capacity map keyed by 128-bit
//! MurmurHash3 digests, for deduplicating fixed-size binary records from
//! many threads at once.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: map content digests to small `Copy` values (e.g. `NodeId`)
//!   with many threads inserting and querying a shared table, keeping
//!   exactly one entry per unique digest.
//! - Layers:
//!   - `murmur3`: the MurmurHash3 family; `x64_128` produces the digest.
//!   - `Digest`: 16 opaque bytes with a portable layout (two
//!     little-endian u64 halves), constant-time equality, and a
//!     pass-through hasher for host-side `hashbrown` maps.
//!   - `DigestMap<V>`: open-addressing table with one atomic state byte
//!     per slot; all data-path operations take `&self`.
//!   - `batch`: rayon drivers that fan a batch out over one table.
//!
//! Constraints
//! - Capacity is fixed between `rehash` calls. `rehash`, `clear` and
//!   `reset` take `&mut self`, so no insert/find can be in flight while
//!   the table is restructured.
//! - Values are `Copy`; slots never run destructors.
//! - No heap allocation on the data path.
//!
//! Insert protocol
//! - A slot is claimed by a single compare-and-swap `Empty -> Busy`. The
//!   claimer writes digest and value, then stores `Occupied` with Release.
//!   Readers load the state with Acquire before touching the payload.
//! - An insert that meets a `Busy` slot waits for it to settle and then
//!   compares digests, so two threads inserting the same digest always
//!   agree on one slot. The loser gets `InsertResult::Existing`.
//! - Tombstones (`Deleted`) are skipped, never reused, and count toward
//!   the load factor until `clear`/`rehash`. Since slots only become
//!   `Empty` again under `&mut self`, a present digest always lies before
//!   the first empty slot of its probe sequence.
//!
//! Failure semantics
//! - A full table is a normal condition: `InsertResult::Failed` plus a
//!   sticky `failed_insert()` flag. Absent keys are `None`/`false`.
//! - Capacity requests beyond `MAX_SLOTS` return `CapacityError`.
//!
//! Bucket selection
//! - The bucket index is `fmix32` of the digest's first four bytes masked
//!   to the power-of-two capacity; probing is linear and bounded by the
//!   capacity.

pub mod batch;
pub mod bitwise;
pub mod digest;
pub mod digest_map;
mod digest_map_proptest;
pub mod murmur3;
pub mod node_id;

// Public surface
pub use batch::BatchOutcome;
pub use bitwise::bitwise_eq;
pub use digest::{Digest, DigestBuildHasher, DigestHasher, HostDigestMap};
pub use digest_map::{CapacityError, DigestMap, InsertResult};
pub use murmur3::{hash, hash_into, hash_with_seed, DEFAULT_SEED};
pub use node_id::NodeId;
