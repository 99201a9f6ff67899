//! Interleaved solution with fractional column counts
//! 分数列数的交错解
//!
//! Slots are grouped in blocks of 64. Block `b` stores one u64 per column;
//! blocks before `upper_start_block` carry one column fewer.
//! 槽按 64 个一组成块。块 `b` 每列存一个 u64；
//! `upper_start_block` 之前的块少一列。

use zerocopy::little_endian::U64;

pub(crate) const BLOCK: usize = 64;
pub(crate) const MAX_COLUMNS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Columns {
  pub num_blocks: usize,
  pub upper: u32,
  pub upper_start_block: usize,
}

impl Columns {
  /// Spread `words` solution words over `num_blocks` blocks
  /// 将 `words` 个解字分摊到 `num_blocks` 个块
  pub fn spread(num_blocks: usize, words: usize) -> Self {
    let words = words.max(num_blocks);
    let lower = words / num_blocks;
    let extra = words % num_blocks;
    if lower >= MAX_COLUMNS as usize {
      Self {
        num_blocks,
        upper: MAX_COLUMNS,
        upper_start_block: 0,
      }
    } else if extra == 0 {
      Self {
        num_blocks,
        upper: lower as u32,
        upper_start_block: 0,
      }
    } else {
      Self {
        num_blocks,
        upper: lower as u32 + 1,
        upper_start_block: num_blocks - extra,
      }
    }
  }

  #[inline(always)]
  pub fn cols(&self, block: usize) -> usize {
    if block < self.upper_start_block {
      self.upper as usize - 1
    } else {
      self.upper as usize
    }
  }

  /// First solution word of `block`
  /// `block` 的首个解字
  #[inline(always)]
  pub fn offset(&self, block: usize) -> usize {
    let upper = self.upper as usize;
    if block < self.upper_start_block {
      block * (upper - 1)
    } else {
      self.upper_start_block * (upper - 1) + (block - self.upper_start_block) * upper
    }
  }

  #[inline]
  pub fn words(&self) -> usize {
    self.offset(self.num_blocks)
  }

  pub fn is_valid(&self) -> bool {
    self.num_blocks > 0
      && (1..=MAX_COLUMNS).contains(&self.upper)
      && self.upper_start_block <= self.num_blocks
      && (self.upper > 1 || self.upper_start_block == 0)
  }
}

#[inline(always)]
fn parity(x: u64) -> u64 {
  (x.count_ones() & 1) as u64
}

/// Solve the banded system from the last slot backwards
/// 从最后一个槽向前回代求解带状方程组
pub(crate) fn back_subst(coeff: &[u64], result: &[u32], cols: &Columns) -> Vec<U64> {
  let mut out = vec![U64::new(0); cols.words()];
  let mut state = [0u64; MAX_COLUMNS as usize];
  for block in (0..cols.num_blocks).rev() {
    let n = cols.cols(block);
    for i in (block * BLOCK..(block + 1) * BLOCK).rev() {
      let cr = coeff[i];
      let rr = result[i];
      for (j, s) in state[..n].iter_mut().enumerate() {
        let tmp = *s << 1;
        *s = tmp | (parity(tmp & cr) ^ ((rr >> j) & 1) as u64);
      }
    }
    let off = cols.offset(block);
    for (j, s) in state[..n].iter().enumerate() {
      out[off + j] = U64::new(*s);
    }
  }
  out
}

/// Check a row against the solution, `start` is the global slot of its leading one
/// 用解校验一行，`start` 为首个 1 的全局槽位
#[inline]
pub(crate) fn check(sol: &[U64], cols: &Columns, start: usize, cr: u64, rr: u32) -> bool {
  let block = start / BLOCK;
  let bit = start % BLOCK;
  let off = cols.offset(block);
  let n = cols.cols(block);
  let next = off + n;
  for j in 0..n {
    let w0 = sol[off + j].get();
    let v = if bit == 0 {
      w0
    } else {
      (w0 >> bit) | (sol[next + j].get() << (BLOCK - bit))
    };
    if parity(v & cr) != ((rr >> j) & 1) as u64 {
      return false;
    }
  }
  true
}
