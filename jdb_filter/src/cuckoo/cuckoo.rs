//! Cuckoo filter over a power-of-two bucket table
//! 基于 2 的幂桶表的 cuckoo 过滤器

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::U64};

use super::{ENTRIES, buckets::Buckets, fingerprint, insert};
use crate::{
  blob::{Cursor, put},
  conf::default::CUCKOO_LOAD,
  error::{Error, Result},
  hash::{mix, mix64, unique},
};

const MAX_IDX_BITS: u8 = 40;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  fp_bits: u8,
  idx_bits: u8,
}

#[derive(Debug, Clone)]
pub struct Cuckoo<'a> {
  seed: u64,
  idx_mask: usize,
  buckets: Buckets<'a>,
}

/// Bucket count for `capacity` keys, doubled when the load would pass the limit
/// `capacity` 个键所需桶数，负载超限时翻倍
fn bucket_count(capacity: usize) -> usize {
  let n = capacity.div_ceil(ENTRIES).max(1).next_power_of_two();
  if capacity as f64 / (n * ENTRIES) as f64 > CUCKOO_LOAD {
    n * 2
  } else {
    n
  }
}

impl Cuckoo<'static> {
  /// Fails with `EvictionExceeded` when a key cannot be placed
  /// 无法放置键时返回 `EvictionExceeded`
  pub fn build(
    hashes: &[u64],
    fp_bits: u32,
    capacity: Option<usize>,
    seed: u64,
    max_kicks: usize,
  ) -> Result<Self> {
    let keys = unique(hashes);
    let len = bucket_count(capacity.unwrap_or(keys.len()));
    let mut filter = Cuckoo {
      seed,
      idx_mask: len - 1,
      buckets: Buckets::new(fp_bits, len),
    };
    let mut rng = fastrand::Rng::with_seed(seed);
    let mask = filter.idx_mask;
    for &k in &keys {
      let (i0, fp) = filter.locate(k);
      insert(
        &mut filter.buckets,
        i0,
        fp,
        |i, fp| alt(i, fp, mask),
        &mut rng,
        max_kicks,
      )?;
    }
    log::debug!(
      "cuckoo{fp_bits} keys {} buckets {} load {:.3}",
      keys.len(),
      filter.buckets.len(),
      filter.buckets.occupied() as f64 / (len * ENTRIES) as f64
    );
    Ok(filter)
  }
}

#[inline(always)]
fn alt(i: usize, fp: u64, mask: usize) -> usize {
  (i ^ mix64(fp) as usize) & mask
}

impl<'a> Cuckoo<'a> {
  #[inline(always)]
  fn locate(&self, hash: u64) -> (usize, u64) {
    let h = mix(hash, self.seed);
    (h as usize & self.idx_mask, fingerprint(h, self.buckets.fp_bits()))
  }

  #[inline]
  pub fn fp_bits(&self) -> u32 {
    self.buckets.fp_bits()
  }

  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let (i0, fp) = self.locate(hash);
    if self.buckets.contains(i0, fp) {
      return true;
    }
    self.buckets.contains(alt(i0, fp, self.idx_mask), fp)
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    if head.idx_bits > MAX_IDX_BITS {
      return Err(Error::InvalidField("cuckoo idx_bits"));
    }
    let len = 1usize << head.idx_bits;
    let fp_bits = head.fp_bits as u32;
    let bytes = cur.slice::<u8>(Buckets::byte_len(fp_bits, len))?;
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      idx_mask: len - 1,
      buckets: Buckets::view(fp_bits, len, bytes)?,
    })
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        fp_bits: self.buckets.fp_bits() as u8,
        idx_bits: (self.idx_mask + 1).trailing_zeros() as u8,
      },
    );
    dst.extend_from_slice(self.buckets.as_bytes());
  }

  pub fn size(&self) -> usize {
    size_of::<Head>() + self.buckets.as_bytes().len()
  }
}
