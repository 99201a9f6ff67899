//! Xor filter, three equal blocks
//! Xor 过滤器，三个等长块

use std::borrow::Cow;

use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
  little_endian::{U32, U64},
};

use super::{Fp, Layout, fp_of, peel};
use crate::{
  blob::{Cursor, put},
  error::{Error, Result},
  hash::{mix, reduce, unique},
};

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  block_len: U32,
}

/// Three blocks of `block_len` slots, one slot per block
/// 三个长为 `block_len` 的块，每块一个槽
pub(super) struct Blocks(pub u32);

/// `32 + 1.23n` slots split in three
/// `32 + 1.23n` 个槽分成三块
pub(super) fn block_len(n: usize) -> Result<u32> {
  let cap = 32 + (123 * n).div_ceil(100);
  u32::try_from(cap / 3).map_err(|_| Error::InvalidField("xor block_len"))
}

impl Layout for Blocks {
  #[inline(always)]
  fn len(&self) -> usize {
    3 * self.0 as usize
  }

  #[inline(always)]
  fn slots(&self, h: u64) -> [usize; 3] {
    let bl = self.0;
    let len = bl as usize;
    [
      reduce(h as u32, bl) as usize,
      reduce(h.rotate_left(21) as u32, bl) as usize + len,
      reduce(h.rotate_left(42) as u32, bl) as usize + 2 * len,
    ]
  }

  #[inline(always)]
  fn lane(&self, slot: usize) -> usize {
    slot / self.0 as usize
  }
}

/// Xor filter with `F`-bit fingerprints
/// 使用 `F` 位指纹的 Xor 过滤器
#[derive(Debug, Clone)]
pub struct Xor<'a, F: Fp> {
  seed: u64,
  block_len: u32,
  fps: Cow<'a, [F::Le]>,
}

impl<F: Fp> Xor<'static, F> {
  pub fn build(hashes: &[u64], seed: u64, tries: u32) -> Result<Self> {
    let keys = unique(hashes);
    Self::build_sorted(&keys, block_len(keys.len())?, seed, tries)
  }

  /// `keys` sorted and distinct
  /// `keys` 已排序去重
  pub(crate) fn build_sorted(keys: &[u64], block_len: u32, seed: u64, tries: u32) -> Result<Self> {
    let (seed, fps) = peel::<F, _>(keys, &Blocks(block_len), seed, tries)?;
    Ok(Self {
      seed,
      block_len,
      fps: Cow::Owned(fps),
    })
  }
}

impl<'a, F: Fp> Xor<'a, F> {
  pub(super) fn into_parts(self) -> (u64, u32, Vec<F::Le>) {
    (self.seed, self.block_len, self.fps.into_owned())
  }

  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let h = mix(hash, self.seed);
    fp_of::<F, _>(&Blocks(self.block_len), &self.fps, h) == F::from_hash(h)
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    let block_len = head.block_len.get();
    if block_len == 0 {
      return Err(Error::InvalidField("xor block_len"));
    }
    let fps = cur.slice::<F::Le>(Blocks(block_len).len())?;
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      block_len,
      fps: Cow::Borrowed(fps),
    })
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        block_len: U32::new(self.block_len),
      },
    );
    put(dst, &self.fps[..]);
  }

  /// Encoded body size in bytes
  /// 编码后正文字节数
  pub fn size(&self) -> usize {
    size_of::<Head>() + self.fps.len() * size_of::<F::Le>()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn members_found() {
    let keys: Vec<u64> = (0..5000u64).map(|i| i.wrapping_mul(0x9E3779B97F4A7C15)).collect();
    let f = Xor::<u8>::build(&keys, 11, 100).unwrap();
    assert!(keys.iter().all(|&k| f.may_contain(k)));
    assert_eq!(f.fps.len() % 3, 0);

    let mut buf = Vec::new();
    f.encode(&mut buf);
    assert_eq!(buf.len(), f.size());
    let v = Xor::<u8>::decode(&buf).unwrap();
    assert!(matches!(v.fps, Cow::Borrowed(_)));
    for k in 0..20_000u64 {
      assert_eq!(v.may_contain(k), f.may_contain(k));
    }
  }

  #[test]
  fn duplicates_collapse() {
    let keys = [7u64, 7, 7, 9, 9];
    let f = Xor::<u16>::build(&keys, 0, 100).unwrap();
    assert!(f.may_contain(7) && f.may_contain(9));
  }

  #[test]
  fn undersized_blocks_exhaust() {
    // one slot per block, any two keys share all three slots
    let keys = [1u64, 2, 3];
    assert_eq!(
      Xor::<u8>::build_sorted(&keys, 1, 0, 5).unwrap_err(),
      Error::PeelExhausted { tries: 5 }
    );
  }

  #[test]
  fn lower_blocks_fill_first() {
    let keys: Vec<u64> = (0..30_000u64).map(|i| mix(i, 21)).collect();
    let f = Xor::<u16>::build(&keys, 3, 100).unwrap();
    let bl = f.block_len as usize;
    let used = |b: usize| f.fps[b * bl..(b + 1) * bl].iter().filter(|v| v.get() != 0).count();
    assert!(used(2) < used(0), "{} {}", used(2), used(0));
  }

  #[test]
  fn zero_block_len_rejected() {
    let mut buf = Vec::new();
    put(
      &mut buf,
      &Head {
        seed: U64::new(0),
        block_len: U32::new(0),
      },
    );
    assert_eq!(
      Xor::<u8>::decode(&buf).unwrap_err(),
      Error::InvalidField("xor block_len")
    );
  }
}
