//! Binary fuse filter, slots in three consecutive segments
//! Binary fuse 过滤器，槽位于三个相邻分段

use std::borrow::Cow;

use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
  little_endian::{U32, U64},
};

use super::{Fp, Layout, fp_of, peel};
use crate::{
  blob::{Cursor, put},
  error::{Error, Result},
  hash::{mix, mulhi, unique},
};

const MAX_SEGMENT_LENGTH: usize = 262_144;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  segment_length: U32,
  segment_count_length: U32,
  array_len: U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segments {
  segment_length: u32,
  segment_count_length: u32,
}

impl Segments {
  fn for_keys(n: usize) -> Result<Self> {
    let sl = if n == 0 {
      4
    } else {
      let exp = ((n as f64).ln() / 3.33f64.ln() + 2.25).floor() as u32;
      (1usize << exp).min(MAX_SEGMENT_LENGTH)
    };
    let factor = if n <= 1 {
      0.0
    } else {
      (0.875 + 0.25 * 1_000_000f64.ln() / (n as f64).ln()).max(1.125)
    };
    let capacity = (n as f64 * factor).round() as usize;
    let init = capacity.div_ceil(sl).saturating_sub(2);
    let seg_count = init.max(1);
    let too_big = |_| Error::InvalidField("fuse segment_count_length");
    u32::try_from((seg_count + 2) * sl).map_err(too_big)?;
    Ok(Self {
      segment_length: sl as u32,
      segment_count_length: (seg_count * sl) as u32,
    })
  }

  #[inline(always)]
  fn mask(&self) -> u64 {
    self.segment_length as u64 - 1
  }
}

impl Layout for Segments {
  #[inline(always)]
  fn len(&self) -> usize {
    self.segment_count_length as usize + 2 * self.segment_length as usize
  }

  #[inline(always)]
  fn slots(&self, h: u64) -> [usize; 3] {
    let sl = self.segment_length as u64;
    let h0 = mulhi(h, self.segment_count_length as u64);
    let h1 = (h0 + sl) ^ ((h >> 18) & self.mask());
    let h2 = (h0 + 2 * sl) ^ (h & self.mask());
    [h0 as usize, h1 as usize, h2 as usize]
  }
}

/// Binary fuse filter with `F`-bit fingerprints
/// 使用 `F` 位指纹的 binary fuse 过滤器
#[derive(Debug, Clone)]
pub struct Fuse<'a, F: Fp> {
  seed: u64,
  seg: Segments,
  fps: Cow<'a, [F::Le]>,
}

impl<F: Fp> Fuse<'static, F> {
  pub fn build(hashes: &[u64], seed: u64, tries: u32) -> Result<Self> {
    let keys = unique(hashes);
    let seg = Segments::for_keys(keys.len())?;
    let (seed, fps) = peel::<F, _>(&keys, &seg, seed, tries)?;
    Ok(Self {
      seed,
      seg,
      fps: Cow::Owned(fps),
    })
  }
}

impl<'a, F: Fp> Fuse<'a, F> {
  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let h = mix(hash, self.seed);
    fp_of::<F, _>(&self.seg, &self.fps, h) == F::from_hash(h)
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    let sl = head.segment_length.get();
    let scl = head.segment_count_length.get();
    if !sl.is_power_of_two() || sl as usize > MAX_SEGMENT_LENGTH {
      return Err(Error::InvalidField("fuse segment_length"));
    }
    if scl == 0 || scl % sl != 0 {
      return Err(Error::InvalidField("fuse segment_count_length"));
    }
    let seg = Segments {
      segment_length: sl,
      segment_count_length: scl,
    };
    if head.array_len.get() as usize != seg.len() {
      return Err(Error::InvalidField("fuse array_len"));
    }
    let fps = cur.slice::<F::Le>(seg.len())?;
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      seg,
      fps: Cow::Borrowed(fps),
    })
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        segment_length: U32::new(self.seg.segment_length),
        segment_count_length: U32::new(self.seg.segment_count_length),
        array_len: U32::new(self.seg.len() as u32),
      },
    );
    put(dst, &self.fps[..]);
  }

  pub fn size(&self) -> usize {
    size_of::<Head>() + self.fps.len() * size_of::<F::Le>()
  }
}
