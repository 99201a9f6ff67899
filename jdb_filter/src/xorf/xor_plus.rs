//! Xor+ filter: xor filter with the third block compressed
//! Xor+ 过滤器：压缩第三块的 xor 过滤器
//!
//! Peeling fills the first two blocks first, so most of the third block is
//! zero. Only its non-zero slots are stored, addressed through a rank9
//! bitvector over the block.
//! 剥离优先填充前两块，第三块大多为零。只存储其非零槽，
//! 通过该块上的 rank9 位向量寻址。

use std::borrow::Cow;

use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
  little_endian::{U32, U64},
};

use super::{
  Fp, Layout,
  rank9::{Rank9, bit_words, count_words},
  xor::{Blocks, Xor, block_len},
};
use crate::{
  blob::{Cursor, put},
  error::{Error, Result},
  hash::{mix, unique},
};

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  block_len: U32,
  /// Stored slots of the third block
  /// 第三块中存储的槽数
  third_len: U32,
}

/// Xor+ filter with `F`-bit fingerprints
/// 使用 `F` 位指纹的 Xor+ 过滤器
#[derive(Debug, Clone)]
pub struct XorPlus<'a, F: Fp> {
  seed: u64,
  block_len: u32,
  /// Blocks 0 and 1 in full, then the non-zero slots of block 2
  /// 完整的第 0、1 块，随后是第 2 块的非零槽
  fps: Cow<'a, [F::Le]>,
  rank: Rank9<'a>,
}

impl<F: Fp> XorPlus<'static, F> {
  pub fn build(hashes: &[u64], seed: u64, tries: u32) -> Result<Self> {
    let keys = unique(hashes);
    let xor = Xor::<F>::build_sorted(&keys, block_len(keys.len())?, seed, tries)?;
    let (seed, bl, full) = xor.into_parts();
    let bl_us = bl as usize;

    let mut bits = vec![0u64; bit_words(bl_us)];
    let mut fps = full[..2 * bl_us].to_vec();
    for (i, &v) in full[2 * bl_us..].iter().enumerate() {
      if F::load(v) != F::default() {
        bits[i / 64] |= 1 << (i % 64);
        fps.push(v);
      }
    }
    log::debug!(
      "xor+{} keys {} third block {}/{bl}",
      F::BITS,
      keys.len(),
      fps.len() - 2 * bl_us
    );
    Ok(Self {
      seed,
      block_len: bl,
      fps: Cow::Owned(fps),
      rank: Rank9::build(bits),
    })
  }
}

impl<'a, F: Fp> XorPlus<'a, F> {
  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let h = mix(hash, self.seed);
    let bl = self.block_len as usize;
    let [a, b, c] = Blocks(self.block_len).slots(h);
    let mut f = F::load(self.fps[a]) ^ F::load(self.fps[b]);
    let c = c - 2 * bl;
    if self.rank.get(c) {
      match self.fps.get((2 * bl).saturating_add(self.rank.rank(c))) {
        Some(&v) => f = f ^ F::load(v),
        // Corrupt rank counts, answer conservatively
        None => return true,
      }
    }
    f == F::from_hash(h)
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    let block_len = head.block_len.get();
    let third_len = head.third_len.get();
    if block_len == 0 {
      return Err(Error::InvalidField("xor+ block_len"));
    }
    if third_len > block_len {
      return Err(Error::InvalidField("xor+ third_len"));
    }
    let bl = block_len as usize;
    let fps = cur.slice::<F::Le>(2 * bl + third_len as usize)?;
    let bits = cur.slice::<U64>(bit_words(bl))?;
    let counts = cur.slice::<U64>(count_words(bl))?;
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      block_len,
      fps: Cow::Borrowed(fps),
      rank: Rank9::borrowed(bits, counts),
    })
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        block_len: U32::new(self.block_len),
        third_len: U32::new((self.fps.len() - 2 * self.block_len as usize) as u32),
      },
    );
    put(dst, &self.fps[..]);
    put(dst, self.rank.bits());
    put(dst, self.rank.counts());
  }

  pub fn size(&self) -> usize {
    size_of::<Head>() + self.fps.len() * size_of::<F::Le>() + self.rank.size()
  }
}
