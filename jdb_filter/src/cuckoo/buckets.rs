//! Bucket storage for cuckoo fingerprints.
//! cuckoo 指纹的桶存储

use super::{ENTRIES, Table, bits::Bits};
use crate::error::{Error, Result};

/// Bit-dense table of `ENTRIES` fingerprints per bucket.
/// 每桶 `ENTRIES` 个指纹的紧凑位表
#[derive(Debug, Clone)]
pub struct Buckets<'a> {
  fp_bits: usize,
  fp_mask: u64,
  bucket_bits: usize,
  len: usize,
  bits: Bits<'a>,
}

impl Buckets<'static> {
  /// Create new bucket array.
  /// 创建新的桶数组
  pub fn new(fp_bits: u32, len: usize) -> Self {
    let fp_bits = fp_bits as usize;
    let bucket_bits = fp_bits * ENTRIES;
    Buckets {
      fp_bits,
      fp_mask: (1u64 << fp_bits) - 1,
      bucket_bits,
      len,
      bits: Bits::new(bucket_bits * len),
    }
  }
}

impl<'a> Buckets<'a> {
  /// Byte size of a table
  /// 表的字节数
  #[inline]
  pub fn byte_len(fp_bits: u32, len: usize) -> usize {
    (fp_bits as usize * ENTRIES * len).div_ceil(8)
  }

  /// View over encoded bytes
  /// 基于编码字节的视图
  pub fn view(fp_bits: u32, len: usize, bytes: &'a [u8]) -> Result<Self> {
    if !matches!(fp_bits, 8 | 12 | 16) {
      return Err(Error::InvalidField("bucket fp_bits"));
    }
    let expected = Self::byte_len(fp_bits, len);
    if bytes.len() != expected {
      return Err(Error::LenMismatch {
        expected,
        actual: bytes.len(),
      });
    }
    let fp_bits = fp_bits as usize;
    Ok(Buckets {
      fp_bits,
      fp_mask: (1u64 << fp_bits) - 1,
      bucket_bits: fp_bits * ENTRIES,
      len,
      bits: Bits::borrowed(bytes),
    })
  }

  /// Returns number of buckets.
  /// 返回桶数量
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn fp_bits(&self) -> u32 {
    self.fp_bits as u32
  }

  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    self.bits.as_bytes()
  }

  /// Check if bucket contains fingerprint.
  /// 检查桶是否包含指纹
  ///
  /// A bucket is at most 64 bits and starts on a byte, so one read covers it.
  /// 桶最多 64 位且按字节对齐，一次读取即可覆盖
  #[inline]
  pub fn contains(&self, idx: usize, fp: u64) -> bool {
    debug_assert_ne!(fp, 0);
    let bucket = self.bits.read_raw(self.bucket_bits * idx);
    let fp_bits = self.fp_bits;
    let fp_mask = self.fp_mask;
    // Use | instead of || to avoid branch misprediction
    // 使用 | 代替 || 避免分支预测失败
    ((bucket & fp_mask) == fp)
      | (((bucket >> fp_bits) & fp_mask) == fp)
      | (((bucket >> (fp_bits * 2)) & fp_mask) == fp)
      | (((bucket >> (fp_bits * 3)) & fp_mask) == fp)
  }

  /// Count of occupied slots.
  /// 已占用槽数
  pub fn occupied(&self) -> usize {
    (0..self.len)
      .map(|idx| {
        let bucket = self.bits.read_raw(self.bucket_bits * idx);
        (0..ENTRIES)
          .filter(|i| (bucket >> (self.fp_bits * i)) & self.fp_mask != 0)
          .count()
      })
      .sum()
  }
}

impl Table for Buckets<'_> {
  /// Try to insert fingerprint into bucket.
  /// 尝试将指纹插入桶
  #[inline]
  fn try_insert(&mut self, idx: usize, fp: u64) -> bool {
    debug_assert_ne!(fp, 0);
    let base = self.bucket_bits * idx;
    let bucket = self.bits.read_raw(base);
    for i in 0..ENTRIES {
      if (bucket >> (self.fp_bits * i)) & self.fp_mask == 0 {
        self
          .bits
          .set_uint_masked(base + self.fp_bits * i, self.fp_mask, fp);
        return true;
      }
    }
    false
  }

  #[inline]
  fn swap(&mut self, idx: usize, slot: usize, fp: u64) -> u64 {
    let off = self.bucket_bits * idx + self.fp_bits * slot;
    let old = self.bits.get_uint_masked(off, self.fp_mask);
    self.bits.set_uint_masked(off, self.fp_mask, fp);
    debug_assert_ne!(old, 0);
    old
  }
}
