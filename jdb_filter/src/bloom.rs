//! Blocked bloom filter, one 512-bit bucket per key
//! 分块布隆过滤器，每个键落在一个 512 位桶中
//!
//! A key sets one bit in each of the bucket's eight words.
//! 每个键在桶内八个字中各置一位。

use std::borrow::Cow;

use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
  little_endian::{U32, U64},
};

use crate::{
  blob::{Cursor, put},
  error::{Error, Result},
  hash::{mix, reduce},
};

const WORDS: usize = 8;
const BUCKET_BITS: usize = WORDS * 64;

const SALT: [u32; WORDS] = [
  0x47b6137b, 0x44974d91, 0x8824ad5b, 0xa2b7289d, 0x705495c7, 0x2df1424b, 0x9efc4947, 0x5c6bfb31,
];

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  num_buckets: U32,
}

#[inline(always)]
fn bit(h: u32, i: usize) -> u64 {
  1u64 << (h.wrapping_mul(SALT[i]) >> 26)
}

#[derive(Debug, Clone)]
pub struct Bloom<'a> {
  seed: u64,
  num_buckets: u32,
  words: Cow<'a, [U64]>,
}

impl Bloom<'static> {
  /// Never fails; an empty key set still gets one bucket
  /// 不会失败；空键集也分配一个桶
  pub fn build(hashes: &[u64], bits_per_key: u32, seed: u64) -> Result<Self> {
    let bits = hashes.len().saturating_mul(bits_per_key as usize);
    let num_buckets = u32::try_from(bits.div_ceil(BUCKET_BITS).max(1))
      .map_err(|_| Error::InvalidField("bloom num_buckets"))?;
    let mut words = vec![0u64; num_buckets as usize * WORDS];
    for &k in hashes {
      let h = mix(k, seed);
      let base = reduce((h >> 32) as u32, num_buckets) as usize * WORDS;
      let lo = h as u32;
      for (i, w) in words[base..base + WORDS].iter_mut().enumerate() {
        *w |= bit(lo, i);
      }
    }
    Ok(Self {
      seed,
      num_buckets,
      words: Cow::Owned(words.into_iter().map(U64::new).collect()),
    })
  }
}

impl<'a> Bloom<'a> {
  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let h = mix(hash, self.seed);
    let base = reduce((h >> 32) as u32, self.num_buckets) as usize * WORDS;
    let lo = h as u32;
    self.words[base..base + WORDS]
      .iter()
      .enumerate()
      .all(|(i, w)| w.get() & bit(lo, i) != 0)
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    let num_buckets = head.num_buckets.get();
    if num_buckets == 0 {
      return Err(Error::InvalidField("bloom num_buckets"));
    }
    let words = cur.slice::<U64>(num_buckets as usize * WORDS)?;
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      num_buckets,
      words: Cow::Borrowed(words),
    })
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        num_buckets: U32::new(self.num_buckets),
      },
    );
    put(dst, &self.words[..]);
  }

  pub fn size(&self) -> usize {
    size_of::<Head>() + self.words.len() * 8
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn no_false_negatives() {
    let keys: Vec<u64> = (0..10_000u64).map(|i| mix(i, 1)).collect();
    let f = Bloom::build(&keys, 10, 77).unwrap();
    assert!(keys.iter().all(|&k| f.may_contain(k)));
    assert_eq!(f.num_buckets as usize, (10_000 * 10usize).div_ceil(512));
  }

  #[test]
  fn false_positive_rate_reasonable() {
    let keys: Vec<u64> = (0..10_000u64).map(|i| mix(i, 1)).collect();
    let f = Bloom::build(&keys, 10, 77).unwrap();
    // disjoint from the keys, `mix` adds the seed before mixing
    let fp = (0..100_000u64)
      .map(|i| mix(i, 1 << 40))
      .filter(|&k| f.may_contain(k))
      .count();
    // k=8 in 512-bit blocks at 10 bits/key stays near 1%
    assert!(fp < 3_000, "fp {fp}");
  }

  #[test]
  fn empty_has_one_bucket() {
    let f = Bloom::build(&[], 10, 0).unwrap();
    assert_eq!(f.num_buckets, 1);
    assert!(!f.may_contain(1));
  }

  #[test]
  fn view_matches() {
    let keys: Vec<u64> = (0..3000u64).collect();
    let f = Bloom::build(&keys, 6, 3).unwrap();
    let mut buf = Vec::new();
    f.encode(&mut buf);
    let v = Bloom::decode(&buf).unwrap();
    for k in 0..10_000u64 {
      assert_eq!(v.may_contain(k), f.may_contain(k));
    }
    assert!(matches!(
      Bloom::decode(&buf[..buf.len() - 8]),
      Err(Error::LenMismatch { .. })
    ));
  }
}
