//! Semi-sorted bucket packing
//! 半排序桶压缩
//!
//! The four fingerprints of a bucket are sorted; their high nibbles then
//! form a multiset of four values out of sixteen (3876 cases) stored as a
//! 12-bit rank, saving four bits per bucket.
//! 桶内四个指纹排序后，其高四位构成十六选四的可重集合（3876 种），
//! 以 12 位序号存储，每桶节省四位。

/// Number of sorted nibble quadruples
/// 有序四元组数量
pub const RANKS: usize = 3876;
pub const RANK_BITS: u32 = 12;

const fn choose(n: u32, k: u32) -> u32 {
  let mut r = 1u32;
  let mut i = 0;
  while i < k {
    if n < k {
      return 0;
    }
    r = r * (n - i) / (i + 1);
    i += 1;
  }
  r
}

/// Rank of a non-decreasing nibble quadruple
/// 非递减四元组的序号
#[inline]
pub const fn rank(n: [u8; 4]) -> u16 {
  (choose(n[0] as u32, 1)
    + choose(n[1] as u32 + 1, 2)
    + choose(n[2] as u32 + 2, 3)
    + choose(n[3] as u32 + 3, 4)) as u16
}

const fn decode_table() -> [u16; RANKS] {
  let mut t = [0u16; RANKS];
  let mut d = 0u8;
  while d < 16 {
    let mut c = 0u8;
    while c <= d {
      let mut b = 0u8;
      while b <= c {
        let mut a = 0u8;
        while a <= b {
          t[rank([a, b, c, d]) as usize] =
            a as u16 | (b as u16) << 4 | (c as u16) << 8 | (d as u16) << 12;
          a += 1;
        }
        b += 1;
      }
      c += 1;
    }
    d += 1;
  }
  t
}

static DECODE: [u16; RANKS] = decode_table();

/// Nibbles of a rank, `None` for ranks no bucket can hold
/// 序号对应的四元组，非法序号返回 `None`
#[inline(always)]
pub fn unrank(r: usize) -> Option<[u8; 4]> {
  DECODE.get(r).map(|&v| {
    [
      (v & 0xf) as u8,
      (v >> 4 & 0xf) as u8,
      (v >> 8 & 0xf) as u8,
      (v >> 12) as u8,
    ]
  })
}

/// Pack four `fp_bits`-wide fingerprints into a `4 * fp_bits - 4` bit word
/// 将四个 `fp_bits` 位指纹压成 `4 * fp_bits - 4` 位
pub fn pack(mut slot: [u32; 4], fp_bits: u32) -> u64 {
  slot.sort_unstable();
  let low_bits = fp_bits - 4;
  let low_mask = (1u64 << low_bits) - 1;
  let mut nib = [0u8; 4];
  let mut w = 0u64;
  for (i, &fp) in slot.iter().enumerate() {
    nib[i] = (fp >> low_bits) as u8;
    w |= (fp as u64 & low_mask) << (RANK_BITS + low_bits * i as u32);
  }
  w | rank(nib) as u64
}

/// Inverse of `pack`; zero entries are empty slots
/// `pack` 的逆运算；零为空槽
#[inline(always)]
pub fn unpack(w: u64, fp_bits: u32) -> Option<[u32; 4]> {
  let low_bits = fp_bits - 4;
  let low_mask = (1u64 << low_bits) - 1;
  let nib = unrank((w & ((1 << RANK_BITS) - 1)) as usize)?;
  let mut out = [0u32; 4];
  for (i, o) in out.iter_mut().enumerate() {
    let low = (w >> (RANK_BITS + low_bits * i as u32)) & low_mask;
    *o = ((nib[i] as u64) << low_bits | low) as u32;
  }
  Some(out)
}
