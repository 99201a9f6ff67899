//! Peeling filters: xor, xor+ and binary fuse
//! 剥离类过滤器：xor、xor+ 与 binary fuse
//!
//! Each key touches three slots. Construction peels degree-one slots onto a
//! stack, then assigns fingerprints in reverse so that the xor of the three
//! slots equals the key fingerprint.
//! 每个键映射到三个槽。构建时把度为一的槽剥离入栈，再逆序赋值，
//! 使三个槽的异或等于键指纹。

mod fuse;
mod rank9;
mod xor;
mod xor_plus;

use std::ops::BitXor;

pub use fuse::Fuse;
pub use xor::Xor;
pub use xor_plus::XorPlus;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::U16};

use crate::{
  error::{Error, Result},
  hash::{mix, splitmix64},
};

/// Fingerprint word stored in a slot
/// 槽中存储的指纹字
pub trait Fp: Copy + Default + Eq + BitXor<Output = Self> + std::fmt::Debug {
  /// On-disk form
  /// 磁盘形式
  type Le: Copy + std::fmt::Debug + FromBytes + IntoBytes + Immutable + KnownLayout + Unaligned;

  const BITS: u32;

  fn from_hash(h: u64) -> Self;
  fn load(v: Self::Le) -> Self;
  fn store(self) -> Self::Le;
}

impl Fp for u8 {
  type Le = u8;
  const BITS: u32 = 8;

  #[inline(always)]
  fn from_hash(h: u64) -> Self {
    (h ^ (h >> 32)) as u8
  }

  #[inline(always)]
  fn load(v: u8) -> Self {
    v
  }

  #[inline(always)]
  fn store(self) -> u8 {
    self
  }
}

impl Fp for u16 {
  type Le = U16;
  const BITS: u32 = 16;

  #[inline(always)]
  fn from_hash(h: u64) -> Self {
    (h ^ (h >> 32)) as u16
  }

  #[inline(always)]
  fn load(v: U16) -> Self {
    v.get()
  }

  #[inline(always)]
  fn store(self) -> U16 {
    U16::new(self)
  }
}

/// Slot mapping of a peeling layout
/// 剥离布局的槽映射
pub(crate) trait Layout {
  /// Total slot count
  /// 槽总数
  fn len(&self) -> usize;

  /// Three distinct slots of a mixed hash
  /// 混合哈希对应的三个不同槽
  fn slots(&self, h: u64) -> [usize; 3];

  /// Peeling takes degree-one slots of lower lanes first, `0..LANES`
  /// 剥离优先处理低车道的度一槽，取值 `0..LANES`
  #[inline(always)]
  fn lane(&self, _slot: usize) -> usize {
    0
  }
}

pub(crate) const LANES: usize = 3;

#[inline(always)]
pub(crate) fn fp_of<F: Fp, L: Layout>(layout: &L, fps: &[F::Le], h: u64) -> F {
  let [a, b, c] = layout.slots(h);
  F::load(fps[a]) ^ F::load(fps[b]) ^ F::load(fps[c])
}

/// Peel `keys` (sorted, distinct) under successive seeds, returns the
/// winning seed and the slot fingerprints
/// 用一系列种子剥离 `keys`（有序去重），返回成功的种子与槽指纹
pub(crate) fn peel<F: Fp, L: Layout>(
  keys: &[u64],
  layout: &L,
  seed: u64,
  tries: u32,
) -> Result<(u64, Vec<F::Le>)> {
  let cap = layout.len();
  let mut count = vec![0u32; cap];
  let mut xor_mask = vec![0u64; cap];
  let mut queue: [Vec<usize>; LANES] = Default::default();
  let mut stack: Vec<(u64, usize)> = Vec::with_capacity(keys.len());

  let mut state = seed;
  let mut seed = seed;
  for attempt in 0..tries {
    if attempt > 0 {
      seed = splitmix64(&mut state);
      log::trace!("peel reseed attempt {attempt} keys {}", keys.len());
      count.fill(0);
      xor_mask.fill(0);
      queue.iter_mut().for_each(Vec::clear);
      stack.clear();
    }

    for &k in keys {
      let h = mix(k, seed);
      for s in layout.slots(h) {
        count[s] += 1;
        xor_mask[s] ^= h;
      }
    }

    for i in (0..cap).filter(|&i| count[i] == 1) {
      queue[layout.lane(i)].push(i);
    }
    while let Some(i) = queue.iter_mut().find_map(Vec::pop) {
      if count[i] != 1 {
        continue;
      }
      let h = xor_mask[i];
      stack.push((h, i));
      for s in layout.slots(h) {
        count[s] -= 1;
        xor_mask[s] ^= h;
        if count[s] == 1 {
          queue[layout.lane(s)].push(s);
        }
      }
    }

    if stack.len() == keys.len() {
      let mut fps = vec![F::default(); cap];
      for &(h, i) in stack.iter().rev() {
        let [a, b, c] = layout.slots(h);
        fps[i] = F::from_hash(h) ^ fps[a] ^ fps[b] ^ fps[c];
      }
      return Ok((seed, fps.into_iter().map(F::store).collect()));
    }
  }
  Err(Error::PeelExhausted { tries })
}
