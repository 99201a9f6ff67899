//! Tagged blob envelope: `[tag u8][version u8][body]`
//! 带标签的 blob 封装：`[tag u8][version u8][body]`
//!
//! Tag `0` is the always-true degraded filter. Bit `0x80` marks a fallback
//! payload, the low bits carry the family id.
//! 标签 `0` 为恒真降级过滤器。`0x80` 位标记回退载荷，低位为族编号。

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
  error::{Error, Result},
  family::Family,
  filter::Filter,
};

pub const VERSION: u8 = 1;
pub const TAG_ALWAYS_TRUE: u8 = 0;
pub const TAG_FALLBACK: u8 = 0x80;
pub const HEAD_SIZE: usize = 2;

/// Decoded blob
/// 解码后的 blob
#[derive(Debug, Clone)]
pub enum Blob<'a> {
  /// Zero-length blob, no filter was built
  /// 零长度 blob，未构建过滤器
  Empty,
  /// Degraded filter, matches everything
  /// 降级过滤器，匹配一切
  AlwaysTrue,
  Primary(Filter<'a>),
  /// Substitute family written when the requested one could not be used
  /// 请求的族不可用时写入的替代族
  Fallback(Filter<'a>),
}

impl<'a> Blob<'a> {
  /// Reconstruct a view over borrowed bytes, bulk arrays are not copied
  /// 在借用字节上重建视图，不复制大数组
  pub fn decode(bytes: &'a [u8]) -> Result<Self> {
    if bytes.is_empty() {
      return Ok(Blob::Empty);
    }
    if bytes.len() < HEAD_SIZE {
      return Err(Error::TooShort {
        need: HEAD_SIZE,
        got: bytes.len(),
      });
    }
    let tag = bytes[0];
    let ver = bytes[1];
    if ver != VERSION {
      return Err(Error::Version(ver));
    }
    let body = &bytes[HEAD_SIZE..];
    if tag == TAG_ALWAYS_TRUE {
      if !body.is_empty() {
        return Err(Error::LenMismatch {
          expected: HEAD_SIZE,
          actual: bytes.len(),
        });
      }
      return Ok(Blob::AlwaysTrue);
    }
    let family = Family::from_id(tag & !TAG_FALLBACK).ok_or(Error::UnknownTag(tag))?;
    let filter = Filter::decode(family, body)?;
    Ok(if tag & TAG_FALLBACK != 0 {
      Blob::Fallback(filter)
    } else {
      Blob::Primary(filter)
    })
  }

  /// Append the encoded blob to `dst`
  /// 将编码后的 blob 追加到 `dst`
  pub fn encode(&self, dst: &mut Vec<u8>) {
    match self {
      Blob::Empty => {}
      Blob::AlwaysTrue => dst.extend_from_slice(&[TAG_ALWAYS_TRUE, VERSION]),
      Blob::Primary(f) => {
        dst.extend_from_slice(&[f.family().id(), VERSION]);
        f.encode(dst);
      }
      Blob::Fallback(f) => {
        dst.extend_from_slice(&[f.family().id() | TAG_FALLBACK, VERSION]);
        f.encode(dst);
      }
    }
  }

  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    match self {
      Blob::Empty | Blob::AlwaysTrue => true,
      Blob::Primary(f) | Blob::Fallback(f) => f.may_contain(hash),
    }
  }

  pub fn family(&self) -> Option<Family> {
    match self {
      Blob::Empty | Blob::AlwaysTrue => None,
      Blob::Primary(f) | Blob::Fallback(f) => Some(f.family()),
    }
  }

  pub fn filter(&self) -> Option<&Filter<'a>> {
    match self {
      Blob::Empty | Blob::AlwaysTrue => None,
      Blob::Primary(f) | Blob::Fallback(f) => Some(f),
    }
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self, Blob::Fallback(_))
  }

  pub fn is_always_true(&self) -> bool {
    matches!(self, Blob::AlwaysTrue)
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, Blob::Empty)
  }

  /// Encoded length in bytes
  /// 编码后的字节长度
  pub fn size(&self) -> usize {
    match self {
      Blob::Empty => 0,
      Blob::AlwaysTrue => HEAD_SIZE,
      Blob::Primary(f) | Blob::Fallback(f) => HEAD_SIZE + f.size(),
    }
  }
}

/// Bounds-checked reader over a blob body
/// 对 blob 正文的带边界检查读取器
pub(crate) struct Cursor<'a> {
  buf: &'a [u8],
  total: usize,
}

impl<'a> Cursor<'a> {
  pub fn new(buf: &'a [u8]) -> Self {
    Self {
      buf,
      total: buf.len(),
    }
  }

  #[inline]
  fn pos(&self) -> usize {
    self.total - self.buf.len()
  }

  pub fn head<T: FromBytes + KnownLayout + Immutable + Unaligned>(&mut self) -> Result<&'a T> {
    let (head, rest) = T::ref_from_prefix(self.buf).map_err(|_| Error::TooShort {
      need: self.pos() + size_of::<T>(),
      got: self.total,
    })?;
    self.buf = rest;
    Ok(head)
  }

  /// Borrow `count` elements in place
  /// 原地借用 `count` 个元素
  pub fn slice<T: FromBytes + Immutable + Unaligned>(&mut self, count: usize) -> Result<&'a [T]> {
    let mismatch = Error::LenMismatch {
      expected: count
        .saturating_mul(size_of::<T>())
        .saturating_add(self.pos()),
      actual: self.total,
    };
    let (li, rest) = <[T]>::ref_from_prefix_with_elems(self.buf, count).map_err(|_| mismatch)?;
    self.buf = rest;
    Ok(li)
  }

  /// Every byte must be consumed
  /// 必须消费完所有字节
  pub fn finish(self) -> Result<()> {
    if self.buf.is_empty() {
      Ok(())
    } else {
      Err(Error::LenMismatch {
        expected: self.pos(),
        actual: self.total,
      })
    }
  }
}

#[inline]
pub(crate) fn put<T: IntoBytes + Immutable + ?Sized>(dst: &mut Vec<u8>, v: &T) {
  dst.extend_from_slice(v.as_bytes());
}
