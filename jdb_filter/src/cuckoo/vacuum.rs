//! Vacuum filter: cuckoo with range-local alternate buckets
//! Vacuum 过滤器：备用桶限定在局部范围内的 cuckoo
//!
//! The alternate bucket lies within a power-of-two range picked by the low
//! two fingerprint bits, so the table size need not be a power of two.
//! 备用桶位于由指纹低两位选出的 2 的幂范围内，因此表大小无需为 2 的幂。

use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
  little_endian::{U32, U64},
};

use super::{ENTRIES, Table, bits::Bits, buckets::Buckets, fingerprint, insert, semisort};
use crate::{
  blob::{Cursor, put},
  conf::default::VACUUM_LOAD,
  error::{Error, Result},
  hash::{mix, mix64, reduce, unique},
};

/// Tables up to this many buckets use a single range
/// 不超过此桶数的表使用单一范围
const SMALL: usize = 1024;
const MIN_BIG: usize = 1024;
const MAX_BIG: usize = 4096;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  fp_bits: u8,
  packed: u8,
  num_buckets: U32,
  ranges_log2: [u8; 4],
}

#[derive(Debug, Clone)]
enum Store<'a> {
  Plain(Buckets<'a>),
  /// Semi-sorted, `4 * fp_bits - 4` bits per bucket
  /// 半排序，每桶 `4 * fp_bits - 4` 位
  Packed(Bits<'a>),
}

#[derive(Debug, Clone)]
pub struct Vacuum<'a> {
  seed: u64,
  fp_bits: u32,
  len: u32,
  ranges_log2: [u8; 4],
  masks: [usize; 4],
  store: Store<'a>,
}

/// Bucket count and alternate ranges for `capacity` keys
/// `capacity` 个键的桶数与备用范围
fn layout(capacity: usize) -> Result<(u32, [u8; 4])> {
  let needed = ((capacity as f64 / (ENTRIES as f64 * VACUUM_LOAD)).ceil() as usize).max(1);
  let (len, ranges) = if needed <= SMALL {
    let len = needed.next_power_of_two();
    (len, [len.trailing_zeros() as u8; 4])
  } else {
    let big = (1usize << (needed / 8).ilog2()).clamp(MIN_BIG, MAX_BIG);
    let r = big.trailing_zeros() as u8;
    (needed.next_multiple_of(big), [r, r - 1, r - 2, r - 3])
  };
  let len = u32::try_from(len).map_err(|_| Error::InvalidField("vacuum num_buckets"))?;
  Ok((len, ranges))
}

fn masks(ranges_log2: [u8; 4]) -> [usize; 4] {
  ranges_log2.map(|r| (1usize << r) - 1)
}

#[inline(always)]
fn alt(i: usize, fp: u64, masks: &[usize; 4]) -> usize {
  i ^ (mix64(fp) as usize & masks[(fp & 3) as usize])
}

#[inline(always)]
fn bucket_bits(fp_bits: u32) -> usize {
  4 * fp_bits as usize - 4
}

/// Word-per-slot table used to build the packed layout
/// 构建压缩布局时使用的逐槽表
struct Loose(Vec<[u32; ENTRIES]>);

impl Table for Loose {
  fn try_insert(&mut self, idx: usize, fp: u64) -> bool {
    match self.0[idx].iter_mut().find(|s| **s == 0) {
      Some(s) => {
        *s = fp as u32;
        true
      }
      None => false,
    }
  }

  fn swap(&mut self, idx: usize, slot: usize, fp: u64) -> u64 {
    std::mem::replace(&mut self.0[idx][slot], fp as u32) as u64
  }
}

impl Vacuum<'static> {
  /// `fp_bits` is 8, 12 or 16; packed tables store one extra fingerprint bit
  /// `fp_bits` 为 8、12 或 16；压缩表多存一位指纹
  pub fn build(
    hashes: &[u64],
    fp_bits: u32,
    packed: bool,
    capacity: Option<usize>,
    seed: u64,
    max_kicks: usize,
  ) -> Result<Self> {
    let keys = unique(hashes);
    let (len, ranges_log2) = layout(capacity.unwrap_or(keys.len()))?;
    let masks = masks(ranges_log2);
    let fp_bits = fp_bits + packed as u32;
    let mut rng = fastrand::Rng::with_seed(seed);
    let locate = |k: u64| {
      let h = mix(k, seed);
      (reduce(h as u32, len) as usize, fingerprint(h, fp_bits))
    };
    let alt = |i, fp| alt(i, fp, &masks);

    let store = if packed {
      let mut table = Loose(vec![[0; ENTRIES]; len as usize]);
      for &k in &keys {
        let (i0, fp) = locate(k);
        insert(&mut table, i0, fp, alt, &mut rng, max_kicks)?;
      }
      let bb = bucket_bits(fp_bits);
      let mut bits = Bits::new(bb * len as usize);
      for (idx, slot) in table.0.iter().enumerate() {
        bits.set_uint_masked(idx * bb, word_mask(bb), semisort::pack(*slot, fp_bits));
      }
      Store::Packed(bits)
    } else {
      let mut table = Buckets::new(fp_bits, len as usize);
      for &k in &keys {
        let (i0, fp) = locate(k);
        insert(&mut table, i0, fp, alt, &mut rng, max_kicks)?;
      }
      Store::Plain(table)
    };
    log::debug!(
      "vacuum{fp_bits} packed {packed} keys {} buckets {len} ranges {ranges_log2:?}",
      keys.len()
    );
    Ok(Self {
      seed,
      fp_bits,
      len,
      ranges_log2,
      masks,
      store,
    })
  }
}

#[inline(always)]
fn word_mask(bits: usize) -> u64 {
  if bits >= 64 {
    u64::MAX
  } else {
    (1u64 << bits) - 1
  }
}

impl<'a> Vacuum<'a> {
  /// Stored fingerprint width
  /// 存储的指纹位宽
  #[inline]
  pub fn fp_bits(&self) -> u32 {
    self.fp_bits
  }

  #[inline]
  pub fn is_packed(&self) -> bool {
    matches!(self.store, Store::Packed(_))
  }

  #[inline(always)]
  fn bucket_has(&self, idx: usize, fp: u64) -> bool {
    match &self.store {
      Store::Plain(b) => b.contains(idx, fp),
      Store::Packed(bits) => {
        let bb = bucket_bits(self.fp_bits);
        let w = bits.get_uint_masked(idx * bb, word_mask(bb));
        match semisort::unpack(w, self.fp_bits) {
          Some(slot) => slot.iter().any(|&s| s as u64 == fp),
          // Corrupt rank, answer conservatively
          None => true,
        }
      }
    }
  }

  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let h = mix(hash, self.seed);
    let i0 = reduce(h as u32, self.len) as usize;
    let fp = fingerprint(h, self.fp_bits);
    self.bucket_has(i0, fp) || self.bucket_has(alt(i0, fp, &self.masks), fp)
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    let fp_bits = head.fp_bits as u32;
    let packed = match head.packed {
      0 => false,
      1 => true,
      _ => return Err(Error::InvalidField("vacuum packed")),
    };
    let ok_bits = if packed {
      matches!(fp_bits, 9 | 13 | 17)
    } else {
      matches!(fp_bits, 8 | 12 | 16)
    };
    if !ok_bits {
      return Err(Error::InvalidField("vacuum fp_bits"));
    }
    let len = head.num_buckets.get();
    if len == 0 {
      return Err(Error::InvalidField("vacuum num_buckets"));
    }
    let ranges_log2 = head.ranges_log2;
    if ranges_log2
      .iter()
      .any(|&r| r > 31 || len % (1u32 << r) != 0)
    {
      return Err(Error::InvalidField("vacuum ranges"));
    }
    let store = if packed {
      let bytes = cur.slice::<u8>((bucket_bits(fp_bits) * len as usize).div_ceil(8))?;
      Store::Packed(Bits::borrowed(bytes))
    } else {
      let bytes = cur.slice::<u8>(Buckets::byte_len(fp_bits, len as usize))?;
      Store::Plain(Buckets::view(fp_bits, len as usize, bytes)?)
    };
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      fp_bits,
      len,
      ranges_log2,
      masks: masks(ranges_log2),
      store,
    })
  }

  fn bytes(&self) -> &[u8] {
    match &self.store {
      Store::Plain(b) => b.as_bytes(),
      Store::Packed(b) => b.as_bytes(),
    }
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        fp_bits: self.fp_bits as u8,
        packed: self.is_packed() as u8,
        num_buckets: U32::new(self.len),
        ranges_log2: self.ranges_log2,
      },
    );
    dst.extend_from_slice(self.bytes());
  }

  pub fn size(&self) -> usize {
    size_of::<Head>() + self.bytes().len()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn layout_ranges() {
    let (len, r) = layout(100).unwrap();
    assert_eq!(len, 32);
    assert_eq!(r, [5; 4]);

    let (len, r) = layout(50_000).unwrap();
    assert_eq!(r, [10, 9, 8, 7]);
    assert_eq!(len % 1024, 0);
    assert!(len as usize * ENTRIES >= 50_000);

    let (_, r) = layout(10_000_000).unwrap();
    assert_eq!(r, [12, 11, 10, 9]);
  }

  #[test]
  fn alternate_is_involution() {
    let m = masks([10, 9, 8, 7]);
    for fp in 1..2000u64 {
      for i in [0usize, 5, 1023, 4096 + 77] {
        let j = alt(i, fp, &m);
        assert_eq!(alt(j, fp, &m), i);
        assert_eq!(j / 1024, i / 1024);
      }
    }
  }

  #[test]
  fn members_found_plain_and_packed() {
    let keys: Vec<u64> = (0..50_000u64).map(|i| mix(i, 3)).collect();
    for packed in [false, true] {
      for fp_bits in [8, 12, 16] {
        let f = Vacuum::build(&keys, fp_bits, packed, None, 17, 500).unwrap();
        assert_eq!(f.is_packed(), packed);
        assert!(keys.iter().all(|&k| f.may_contain(k)));

        let mut buf = Vec::new();
        f.encode(&mut buf);
        assert_eq!(buf.len(), f.size());
        let v = Vacuum::decode(&buf).unwrap();
        assert_eq!(v.fp_bits(), f.fp_bits());
        for k in 0..20_000u64 {
          assert_eq!(v.may_contain(k), f.may_contain(k));
        }
      }
    }
  }

  #[test]
  fn packed_stores_extra_bit_in_same_space() {
    let keys: Vec<u64> = (0..10_000u64).collect();
    let plain = Vacuum::build(&keys, 8, false, None, 1, 500).unwrap();
    let packed = Vacuum::build(&keys, 8, true, None, 1, 500).unwrap();
    assert_eq!(plain.size(), packed.size());
    assert_eq!(packed.fp_bits(), 9);
  }

  #[test]
  fn bad_ranges() {
    let mut buf = Vec::new();
    put(
      &mut buf,
      &Head {
        seed: U64::new(0),
        fp_bits: 8,
        packed: 0,
        num_buckets: U32::new(100),
        ranges_log2: [3, 3, 3, 3],
      },
    );
    assert_eq!(
      Vacuum::decode(&buf).unwrap_err(),
      Error::InvalidField("vacuum ranges")
    );
  }
}
