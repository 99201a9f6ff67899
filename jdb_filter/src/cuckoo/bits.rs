//! Bit array for compact fingerprint storage.
//! 用于紧凑指纹存储的位数组

use std::borrow::Cow;

/// Bit array, owned while building, borrowed from a blob when reconstructed.
/// 位数组，构建时持有，重建时借用 blob
#[derive(Debug, Clone)]
pub struct Bits<'a>(Cow<'a, [u8]>);

impl Bits<'static> {
  /// Create new bit array of `size` bits.
  /// 创建 `size` 位的新位数组
  pub fn new(size: usize) -> Self {
    Bits(Cow::Owned(vec![0; size.div_ceil(8)]))
  }
}

impl<'a> Bits<'a> {
  pub fn borrowed(bytes: &'a [u8]) -> Self {
    Bits(Cow::Borrowed(bytes))
  }

  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Little-endian u64 starting at `byte_idx`, zero past the end.
  /// 从 `byte_idx` 起的小端 u64，越界部分为零
  #[inline(always)]
  fn window(&self, byte_idx: usize) -> u64 {
    let buf = &self.0[..];
    if let Some(w) = buf.get(byte_idx..byte_idx + 8) {
      let mut b = [0u8; 8];
      b.copy_from_slice(w);
      return u64::from_le_bytes(b);
    }
    let mut b = [0u8; 8];
    if byte_idx < buf.len() {
      let tail = &buf[byte_idx..];
      b[..tail.len()].copy_from_slice(tail);
    }
    u64::from_le_bytes(b)
  }

  /// Read unsigned integer at given bit position.
  /// 在指定位位置读取无符号整数
  #[inline(always)]
  #[cfg(test)]
  pub fn get_uint(&self, pos: usize, size: usize) -> u64 {
    let mask = if size >= 64 { u64::MAX } else { (1u64 << size) - 1 };
    self.get_uint_masked(pos, mask)
  }

  /// Read unsigned integer with precomputed mask.
  /// 使用预计算的掩码读取无符号整数
  #[inline(always)]
  pub fn get_uint_masked(&self, pos: usize, mask: u64) -> u64 {
    self.read_raw(pos) & mask
  }

  /// Read raw u64 at bit position (no masking).
  /// 在位位置读取原始 u64（不掩码）
  #[inline(always)]
  pub fn read_raw(&self, pos: usize) -> u64 {
    self.window(pos >> 3) >> (pos & 7)
  }

  /// Write unsigned integer at given bit position.
  /// 在指定位位置写入无符号整数
  #[inline(always)]
  #[cfg(test)]
  pub fn set_uint(&mut self, pos: usize, size: usize, val: u64) {
    let mask = if size >= 64 { u64::MAX } else { (1u64 << size) - 1 };
    self.set_uint_masked(pos, mask, val);
  }

  /// Write unsigned integer with precomputed mask.
  /// 使用预计算的掩码写入无符号整数
  ///
  /// `mask << (pos & 7)` must fit in 64 bits.
  /// `mask << (pos & 7)` 须在 64 位内
  #[inline(always)]
  pub fn set_uint_masked(&mut self, pos: usize, mask: u64, val: u64) {
    let byte_idx = pos >> 3;
    let bit_off = pos & 7;
    let old = self.window(byte_idx);
    let new = (old & !(mask << bit_off)) | ((val & mask) << bit_off);
    let buf = self.0.to_mut();
    if byte_idx >= buf.len() {
      return;
    }
    let end = (byte_idx + 8).min(buf.len());
    buf[byte_idx..end].copy_from_slice(&new.to_le_bytes()[..end - byte_idx]);
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn fields_across_byte_boundaries() {
    // 12-bit fields straddle bytes at every odd index
    let mut bits = Bits::new(12 * 100);
    assert_eq!(bits.as_bytes().len(), 150);
    for i in 0..100u64 {
      bits.set_uint(12 * i as usize, 12, i * 37 % 4096);
    }
    for i in 0..100u64 {
      assert_eq!(bits.get_uint(12 * i as usize, 12), i * 37 % 4096);
    }
    // overwriting one field leaves its neighbours intact
    bits.set_uint(12 * 7, 12, 0);
    assert_eq!(bits.get_uint(12 * 6, 12), 6 * 37);
    assert_eq!(bits.get_uint(12 * 7, 12), 0);
    assert_eq!(bits.get_uint(12 * 8, 12), 8 * 37);
  }

  #[test]
  fn borrowed_write_copies() {
    let src = [0xffu8; 4];
    let mut view = Bits::borrowed(&src);
    assert_eq!(view.read_raw(8) & 0xffff, 0xffff);
    // bytes past the end read as zero
    assert_eq!(view.read_raw(16), 0xffff);
    view.set_uint_masked(4, 0xff, 0);
    assert_eq!(view.as_bytes(), &[0x0f, 0xf0, 0xff, 0xff]);
    assert_eq!(src, [0xff; 4]);
  }

  #[test]
  fn tail_without_padding() {
    let mut bits = Bits::new(320);
    assert_eq!(bits.as_bytes().len(), 40);

    bits.set_uint(290, 5, 31);
    assert_eq!(bits.get_uint(290, 5), 31);
    bits.set_uint(290, 5, 21);
    assert_eq!(bits.get_uint(290, 5), 21);

    bits.set_uint(256, 64, u64::MAX - 1);
    assert_eq!(bits.get_uint(256, 64), u64::MAX - 1);
    assert_eq!(bits.get_uint(319, 8), 1);
  }

  #[test]
  fn borrowed_view_reads() {
    let mut bits = Bits::new(64);
    bits.set_uint(12, 12, 0xabc);
    let view = Bits::borrowed(bits.as_bytes());
    assert_eq!(view.get_uint(12, 12), 0xabc);
  }
}
