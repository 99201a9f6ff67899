//! Eviction filters: cuckoo and vacuum
//! 踢出类过滤器：cuckoo 与 vacuum
//!
//! Four fingerprint slots per bucket. A key may live in its home bucket or
//! in the alternate bucket derived from its fingerprint.
//! 每桶四个指纹槽。键可位于主桶，或由指纹推出的备用桶。

mod bits;
mod buckets;
#[allow(clippy::module_inception)]
mod cuckoo;
mod semisort;
mod vacuum;

pub use cuckoo::Cuckoo;
pub use vacuum::Vacuum;

use crate::error::{Error, Result};

/// Slots per bucket
/// 每桶槽数
pub const ENTRIES: usize = 4;

/// Mutable bucket table used while building
/// 构建期间使用的可变桶表
pub(crate) trait Table {
  fn try_insert(&mut self, idx: usize, fp: u64) -> bool;

  /// Put `fp` in `slot`, returns the evicted fingerprint
  /// 将 `fp` 放入 `slot`，返回被踢出的指纹
  fn swap(&mut self, idx: usize, slot: usize, fp: u64) -> u64;
}

/// Fingerprint from the high bits, zero marks an empty slot so it maps to 1
/// 取高位作指纹，零表示空槽，故映射为 1
#[inline(always)]
pub(crate) fn fingerprint(h: u64, fp_bits: u32) -> u64 {
  (h >> (64 - fp_bits)).max(1)
}

/// Insert one fingerprint, relocating victims through a pending stack
/// bounded by `max_kicks`
/// 插入一个指纹，通过待处理栈搬移被踢出者，次数受 `max_kicks` 限制
pub(crate) fn insert<T: Table>(
  table: &mut T,
  i0: usize,
  fp: u64,
  alt: impl Fn(usize, u64) -> usize,
  rng: &mut fastrand::Rng,
  max_kicks: usize,
) -> Result<()> {
  if table.try_insert(i0, fp) {
    return Ok(());
  }
  let i1 = alt(i0, fp);
  if table.try_insert(i1, fp) {
    return Ok(());
  }

  let mut pending = vec![(if rng.bool() { i0 } else { i1 }, fp)];
  let mut kicks = 0;
  while let Some((i, fp)) = pending.pop() {
    if kicks == max_kicks {
      return Err(Error::EvictionExceeded { kicks });
    }
    kicks += 1;
    let victim = table.swap(i, rng.usize(0..ENTRIES), fp);
    let j = alt(i, victim);
    if !table.try_insert(j, victim) {
      pending.push((j, victim));
    }
  }
  Ok(())
}
