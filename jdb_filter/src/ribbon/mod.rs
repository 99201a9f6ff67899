//! Balanced ribbon filter
//! 均衡 Ribbon 过滤器
//!
//! Keys are split into `2^log2_vshards` virtual shards by the top bits of
//! their mixed hash. Each shard is banded on its own with a one-byte seed
//! chosen from 256 candidates, then the whole band is solved backwards into
//! an interleaved column layout.
//! 键按混合哈希的高位分到 `2^log2_vshards` 个虚拟分片。每个分片独立带状消元，
//! 从 256 个候选中选出一字节种子，最后整体回代为交错列布局。

mod banding;
mod soln;

use std::borrow::Cow;

use banding::Band;
use soln::{BLOCK, Columns, back_subst, check};
use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
  little_endian::{U32, U64},
};

use crate::{
  blob::{Cursor, put},
  conf::default::RIBBON_MAX_KEYS,
  error::{Error, Result},
  hash::{mix, mulhi, unique},
};

const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;
const COEFF_SALT: u64 = 0xC2B2_AE3D_27D4_EB4F;
const MAX_LOG2_VSHARDS: u8 = 32;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Head {
  seed: U64,
  log2_vshards: u8,
  upper_num_columns: u8,
  num_blocks: U32,
  upper_start_block: U32,
}

#[derive(Debug, Clone)]
pub struct Ribbon<'a> {
  seed: u64,
  log2_vshards: u8,
  shard_slots: usize,
  cols: Columns,
  /// Banding seed per shard
  /// 每个分片的消元种子
  meta: Cow<'a, [u8]>,
  sol: Cow<'a, [U64]>,
}

#[inline(always)]
fn shard_of(base: u64, log2_vshards: u8) -> usize {
  if log2_vshards == 0 {
    0
  } else {
    (base >> (64 - log2_vshards as u32)) as usize
  }
}

/// Row of a key inside its shard: leading slot, coefficients, result bits
/// 键在分片内的行：首槽、系数、结果位
#[inline(always)]
fn row(base: u64, shard_seed: u8, shard_slots: usize) -> (usize, u64, u32) {
  let hh = mix(base, (shard_seed as u64 + 1).wrapping_mul(GOLDEN));
  let start = mulhi(hh, (shard_slots - (BLOCK - 1)) as u64) as usize;
  (start, mix(hh, COEFF_SALT) | 1, hh as u32)
}

/// Keys per virtual shard before the key set is split
/// 键集拆分前每个虚拟分片的键数
const SHARD_KEYS: usize = 4096;

/// Shards hold between `SHARD_KEYS` and `2 * SHARD_KEYS` keys
/// 每个分片含 `SHARD_KEYS` 到 `2 * SHARD_KEYS` 个键
fn log2_vshards(n: usize) -> u8 {
  let shards = n / SHARD_KEYS;
  if shards < 2 { 0 } else { shards.ilog2() as u8 }
}

/// Slots per shard: keys, one sixth slack for banding, one block of tail
/// 每分片槽数：键数、六分之一消元余量、一个尾块
fn shard_slots(n: usize, log2_vshards: u8) -> usize {
  let per = n.div_ceil(1usize << log2_vshards);
  (per + per / 6 + BLOCK).next_multiple_of(BLOCK)
}

impl Ribbon<'static> {
  /// Fails when the key count is outside `min_keys..=RIBBON_MAX_KEYS` or a
  /// shard has no solvable seed
  /// 键数超出 `min_keys..=RIBBON_MAX_KEYS` 或分片无可解种子时失败
  pub fn build(hashes: &[u64], milli_bits: u32, seed: u64, min_keys: usize) -> Result<Self> {
    let keys = unique(hashes);
    let n = keys.len();
    if n < min_keys || n > RIBBON_MAX_KEYS {
      return Err(Error::KeyCount {
        count: n,
        min: min_keys,
        max: RIBBON_MAX_KEYS,
      });
    }
    let log2 = log2_vshards(n);
    let shards = 1usize << log2;
    let ss = shard_slots(n, log2);
    let total = shards * ss;
    let num_blocks = total / BLOCK;
    if u32::try_from(num_blocks).is_err() {
      return Err(Error::InvalidField("ribbon num_blocks"));
    }

    let mut bases: Vec<u64> = keys.iter().map(|&k| mix(k, seed)).collect();
    bases.sort_unstable();

    let mut coeff = vec![0u64; total];
    let mut result = vec![0u32; total];
    let mut meta = vec![0u8; shards];
    for group in bases.chunk_by(|a, b| shard_of(*a, log2) == shard_of(*b, log2)) {
      let s = shard_of(group[0], log2);
      let lo = s * ss;
      let mut band = Band {
        coeff: &mut coeff[lo..lo + ss],
        result: &mut result[lo..lo + ss],
      };
      meta[s] = solve_shard(&mut band, group, ss)?;
    }

    // `milli_bits / 1000` result columns per slot
    let words = (total as u128 * milli_bits as u128).div_ceil(BLOCK as u128 * 1000) as usize;
    let cols = Columns::spread(num_blocks, words);
    let sol = back_subst(&coeff, &result, &cols);
    log::debug!(
      "ribbon keys {n} shards {shards} slots {total} columns {}/{} bytes {}",
      cols.upper,
      cols.upper_start_block,
      sol.len() * 8
    );
    Ok(Self {
      seed,
      log2_vshards: log2,
      shard_slots: ss,
      cols,
      meta: Cow::Owned(meta),
      sol: Cow::Owned(sol),
    })
  }
}

/// Band one shard, trying each seed byte in turn
/// 对单个分片消元，依次尝试各种子字节
fn solve_shard(band: &mut Band, bases: &[u64], shard_slots: usize) -> Result<u8> {
  for shard_seed in 0..=u8::MAX {
    if shard_seed > 0 {
      band.clear();
      log::trace!("ribbon shard reseed {shard_seed} keys {}", bases.len());
    }
    let ok = bases.iter().all(|&b| {
      let (start, cr, rr) = row(b, shard_seed, shard_slots);
      band.add(start, cr, rr)
    });
    if ok {
      return Ok(shard_seed);
    }
  }
  Err(Error::Unsolvable)
}

impl<'a> Ribbon<'a> {
  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    let base = mix(hash, self.seed);
    let s = shard_of(base, self.log2_vshards);
    let (start, cr, rr) = row(base, self.meta[s], self.shard_slots);
    check(&self.sol, &self.cols, s * self.shard_slots + start, cr, rr)
  }

  /// Solution columns of the widest blocks
  /// 最宽块的解列数
  pub fn upper_num_columns(&self) -> u32 {
    self.cols.upper
  }

  pub fn decode(body: &'a [u8]) -> Result<Self> {
    let mut cur = Cursor::new(body);
    let head = cur.head::<Head>()?;
    let log2 = head.log2_vshards;
    if log2 > MAX_LOG2_VSHARDS {
      return Err(Error::InvalidField("ribbon log2_vshards"));
    }
    let cols = Columns {
      num_blocks: head.num_blocks.get() as usize,
      upper: head.upper_num_columns as u32,
      upper_start_block: head.upper_start_block.get() as usize,
    };
    if !cols.is_valid() {
      return Err(Error::InvalidField("ribbon columns"));
    }
    let shards = 1usize << log2;
    if cols.num_blocks % shards != 0 {
      return Err(Error::InvalidField("ribbon num_blocks"));
    }
    let shard_slots = cols.num_blocks / shards * BLOCK;
    let meta = cur.slice::<u8>(shards)?;
    let sol = cur.slice::<U64>(cols.words())?;
    cur.finish()?;
    Ok(Self {
      seed: head.seed.get(),
      log2_vshards: log2,
      shard_slots,
      cols,
      meta: Cow::Borrowed(meta),
      sol: Cow::Borrowed(sol),
    })
  }

  pub fn encode(&self, dst: &mut Vec<u8>) {
    put(
      dst,
      &Head {
        seed: U64::new(self.seed),
        log2_vshards: self.log2_vshards,
        upper_num_columns: self.cols.upper as u8,
        num_blocks: U32::new(self.cols.num_blocks as u32),
        upper_start_block: U32::new(self.cols.upper_start_block as u32),
      },
    );
    put(dst, &self.meta[..]);
    put(dst, &self.sol[..]);
  }

  pub fn size(&self) -> usize {
    size_of::<Head>() + self.meta.len() + self.sol.len() * 8
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn shard_sizing() {
    assert_eq!(log2_vshards(256), 0);
    assert_eq!(log2_vshards(8191), 0);
    assert_eq!(log2_vshards(8192), 1);
    assert_eq!(log2_vshards(100_000), 4);
    let ss = shard_slots(100_000, 4);
    assert_eq!(ss % BLOCK, 0);
    // about 1.17 slots per key
    assert!(ss * 16 > 116_000 && ss * 16 < 120_000, "{ss}");
  }

  #[test]
  fn members_found_and_view_matches() {
    for n in [256usize, 5000, 100_000] {
      let keys: Vec<u64> = (0..n as u64).map(|i| mix(i, 4)).collect();
      let f = Ribbon::build(&keys, 8000, 6, 256).unwrap();
      assert!(keys.iter().all(|&k| f.may_contain(k)), "n {n}");

      let mut buf = Vec::new();
      f.encode(&mut buf);
      assert_eq!(buf.len(), f.size());
      let v = Ribbon::decode(&buf).unwrap();
      for k in 0..20_000u64 {
        assert_eq!(v.may_contain(k), f.may_contain(k));
      }
    }
  }

  /// Non-members counted over `lookups` queries disjoint from the keys
  /// 统计 `lookups` 次与键不相交的查询中的误判数
  fn false_positives(f: &Ribbon, lookups: u64) -> usize {
    (0..lookups)
      .map(|i| mix(i, 1 << 40))
      .filter(|&k| f.may_contain(k))
      .count()
  }

  #[test]
  fn false_positive_rate_tracks_bits() {
    let keys: Vec<u64> = (0..50_000u64).map(|i| mix(i, 4)).collect();

    let f8 = Ribbon::build(&keys, 8000, 6, 256).unwrap();
    assert_eq!(f8.upper_num_columns(), 8);
    // 2^-8 of 200000 is 781, within 20%
    let fp8 = false_positives(&f8, 200_000);
    assert!((625..=937).contains(&fp8), "fp8 {fp8}");

    let f16 = Ribbon::build(&keys, 16_000, 6, 256).unwrap();
    assert_eq!(f16.upper_num_columns(), 16);
    // 2^-16 of 2000000 is 30.5
    let fp16 = false_positives(&f16, 2_000_000);
    assert!((10..=61).contains(&fp16), "fp16 {fp16}");

    // 9.5 bits mixes blocks of 9 and 10 columns
    let f95 = Ribbon::build(&keys, 9500, 6, 256).unwrap();
    assert_eq!(f95.upper_num_columns(), 10);
    let fp95 = false_positives(&f95, 200_000);
    assert!(fp95 < fp8 && fp95 > false_positives(&f16, 200_000), "fp9.5 {fp95}");
  }

  #[test]
  fn space_tracks_bits() {
    let keys: Vec<u64> = (0..100_000u64).map(|i| mix(i, 4)).collect();
    let f = Ribbon::build(&keys, 8000, 6, 256).unwrap();
    let bits = f.size() as f64 * 8.0 / keys.len() as f64;
    assert!(bits < 8.0 * 1.25, "bits/key {bits:.2}");
  }

  #[test]
  fn key_count_range() {
    let keys: Vec<u64> = (0..100).collect();
    assert_eq!(
      Ribbon::build(&keys, 8000, 0, 256).unwrap_err(),
      Error::KeyCount {
        count: 100,
        min: 256,
        max: RIBBON_MAX_KEYS
      }
    );
  }

  #[test]
  fn bad_columns() {
    let mut buf = Vec::new();
    put(
      &mut buf,
      &Head {
        seed: U64::new(0),
        log2_vshards: 0,
        upper_num_columns: 33,
        num_blocks: U32::new(1),
        upper_start_block: U32::new(0),
      },
    );
    assert_eq!(
      Ribbon::decode(&buf).unwrap_err(),
      Error::InvalidField("ribbon columns")
    );
  }
}
