//! Key hash and seeded mixing
//! 键哈希与带种子的混合

use gxhash::gxhash64;

/// 64-bit key hash
/// 64 位键哈希
///
/// Filters only ever see this value, never the key bytes.
/// 过滤器只看到该值，不接触键字节。
#[inline(always)]
pub fn hash64(key: &[u8]) -> u64 {
  gxhash64(key, 0)
}

/// Murmur3 64-bit finalizer, a bijection on u64.
/// Murmur3 64 位终结混合，u64 上的双射
#[inline(always)]
pub const fn mix64(k: u64) -> u64 {
  let mut h = k;
  h ^= h >> 33;
  h = h.wrapping_mul(0xff51afd7ed558ccd);
  h ^= h >> 33;
  h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
  h ^= h >> 33;
  h
}

/// Applies the finalizer to a seeded key, giving an avalanched hash.
/// 对加种子后的键做终结混合，得到雪崩哈希
#[inline(always)]
pub const fn mix(key: u64, seed: u64) -> u64 {
  mix64(key.wrapping_add(seed))
}

/// Maps a 32-bit hash onto `0..n` without division.
/// 无除法地将 32 位哈希映射到 `0..n`
#[inline(always)]
pub const fn reduce(hash: u32, n: u32) -> u32 {
  ((hash as u64 * n as u64) >> 32) as u32
}

/// High 64 bits of the 128-bit product.
/// 128 位乘积的高 64 位
#[inline(always)]
pub const fn mulhi(a: u64, b: u64) -> u64 {
  ((a as u128 * b as u128) >> 64) as u64
}

/// Next value of a splitmix64 stream, used to draw retry seeds.
/// splitmix64 序列的下一个值，用于重试种子
#[inline]
pub fn splitmix64(state: &mut u64) -> u64 {
  *state = state.wrapping_add(0x9E3779B97F4A7C15);
  let mut z = *state;
  z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
  z ^ (z >> 31)
}

/// Sorted distinct copy of the input hashes.
/// 输入哈希的有序去重副本
pub fn unique(hashes: &[u64]) -> Vec<u64> {
  let mut li = hashes.to_vec();
  li.sort_unstable();
  li.dedup();
  li
}
