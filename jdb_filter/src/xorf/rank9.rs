//! Rank9 bitvector: constant-time rank over 512-bit superblocks
//! Rank9 位向量：以 512 位超块实现常数时间 rank
//!
//! Each superblock has two count words: the ones before it, and the ones
//! before each of its words 1..8 packed as 9-bit fields.
//! 每个超块有两个计数字：之前的 1 的总数，以及块内第 1..8 个字之前的 1 的个数（9 位一组）。

use std::borrow::Cow;

use zerocopy::little_endian::U64;

const WORDS: usize = 8;

#[derive(Debug, Clone)]
pub(crate) struct Rank9<'a> {
  bits: Cow<'a, [U64]>,
  counts: Cow<'a, [U64]>,
}

/// Words holding `len` bits
/// 容纳 `len` 位所需的字数
#[inline]
pub(crate) fn bit_words(len: usize) -> usize {
  len.div_ceil(64)
}

/// Count words for `len` bits
/// `len` 位所需的计数字数
#[inline]
pub(crate) fn count_words(len: usize) -> usize {
  2 * bit_words(len).div_ceil(WORDS)
}

impl Rank9<'static> {
  pub fn build(bits: Vec<u64>) -> Self {
    let mut counts = Vec::with_capacity(2 * bits.len().div_ceil(WORDS));
    let mut total = 0u64;
    for chunk in bits.chunks(WORDS) {
      let mut rel = 0u64;
      let mut packed = 0u64;
      for (w, word) in chunk.iter().enumerate() {
        if w > 0 {
          packed |= rel << (9 * (w - 1));
        }
        rel += word.count_ones() as u64;
      }
      // words past the end repeat the block total
      for w in chunk.len().max(1)..WORDS {
        packed |= rel << (9 * (w - 1));
      }
      counts.push(U64::new(total));
      counts.push(U64::new(packed));
      total += rel;
    }
    Self {
      bits: Cow::Owned(bits.into_iter().map(U64::new).collect()),
      counts: Cow::Owned(counts),
    }
  }
}

impl<'a> Rank9<'a> {
  pub fn borrowed(bits: &'a [U64], counts: &'a [U64]) -> Self {
    Self {
      bits: Cow::Borrowed(bits),
      counts: Cow::Borrowed(counts),
    }
  }

  #[inline(always)]
  pub fn get(&self, pos: usize) -> bool {
    self.bits[pos / 64].get() >> (pos % 64) & 1 == 1
  }

  /// Ones strictly before `pos`
  /// `pos` 之前 1 的个数
  #[inline(always)]
  pub fn rank(&self, pos: usize) -> usize {
    let word = pos / 64;
    let block = word / WORDS;
    let w = word % WORDS;
    let base = self.counts[2 * block].get() as usize;
    let rel = if w == 0 {
      0
    } else {
      (self.counts[2 * block + 1].get() >> (9 * (w - 1)) & 0x1ff) as usize
    };
    let low = self.bits[word].get() & ((1u64 << (pos % 64)) - 1);
    base
      .saturating_add(rel)
      .saturating_add(low.count_ones() as usize)
  }

  pub fn bits(&self) -> &[U64] {
    &self.bits
  }

  pub fn counts(&self) -> &[U64] {
    &self.counts
  }

  /// Size in bytes
  /// 字节数
  pub fn size(&self) -> usize {
    (self.bits.len() + self.counts.len()) * 8
  }
}
