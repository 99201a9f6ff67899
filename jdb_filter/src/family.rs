//! Filter families and concrete variants
//! 过滤器族与具体变体

/// Algorithm family chosen by policy
/// 策略选择的算法族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
  Xor,
  /// Xor with the third block compressed
  /// 压缩第三块的 Xor
  XorPlus,
  BinaryFuse,
  BlockedBloom,
  Cuckoo,
  Vacuum { packed: bool },
  Ribbon { fallback: bool },
}

/// Concrete filter variant, value is the wire id in the blob tag
/// 具体过滤器变体，值即 blob 标签中的编号
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
  Xor8 = 1,
  Xor16 = 2,
  BinaryFuse8 = 3,
  BinaryFuse16 = 4,
  BlockedBloom = 5,
  Cuckoo8 = 6,
  Cuckoo12 = 7,
  Cuckoo16 = 8,
  Vacuum8 = 9,
  Vacuum12 = 10,
  Vacuum16 = 11,
  Vacuum8Packed = 12,
  Vacuum12Packed = 13,
  Vacuum16Packed = 14,
  Ribbon = 15,
  /// Policy-only: written as `Ribbon`, or as a tagged fallback payload
  /// 仅用于策略：写出为 `Ribbon` 或带回退标记的载荷
  RibbonWithFallback = 16,
  XorPlus8 = 17,
  XorPlus16 = 18,
}

impl Family {
  pub const ALL: [Family; 18] = [
    Family::Xor8,
    Family::Xor16,
    Family::XorPlus8,
    Family::XorPlus16,
    Family::BinaryFuse8,
    Family::BinaryFuse16,
    Family::BlockedBloom,
    Family::Cuckoo8,
    Family::Cuckoo12,
    Family::Cuckoo16,
    Family::Vacuum8,
    Family::Vacuum12,
    Family::Vacuum16,
    Family::Vacuum8Packed,
    Family::Vacuum12Packed,
    Family::Vacuum16Packed,
    Family::Ribbon,
    Family::RibbonWithFallback,
  ];

  /// Pick the variant of a family for a bits-per-key budget
  /// 按每键位数选出族内变体
  pub fn pick(kind: Kind, bits_per_key: u32) -> Self {
    match kind {
      Kind::Xor => {
        if bits_per_key >= 16 {
          Family::Xor16
        } else {
          Family::Xor8
        }
      }
      Kind::XorPlus => {
        if bits_per_key >= 16 {
          Family::XorPlus16
        } else {
          Family::XorPlus8
        }
      }
      Kind::BinaryFuse => {
        if bits_per_key >= 16 {
          Family::BinaryFuse16
        } else {
          Family::BinaryFuse8
        }
      }
      Kind::BlockedBloom => Family::BlockedBloom,
      Kind::Cuckoo => match bits_per_key {
        16.. => Family::Cuckoo16,
        12..=15 => Family::Cuckoo12,
        _ => Family::Cuckoo8,
      },
      Kind::Vacuum { packed: false } => match bits_per_key {
        16.. => Family::Vacuum16,
        12..=15 => Family::Vacuum12,
        _ => Family::Vacuum8,
      },
      Kind::Vacuum { packed: true } => match bits_per_key {
        16.. => Family::Vacuum16Packed,
        12..=15 => Family::Vacuum12Packed,
        _ => Family::Vacuum8Packed,
      },
      Kind::Ribbon { fallback: false } => Family::Ribbon,
      Kind::Ribbon { fallback: true } => Family::RibbonWithFallback,
    }
  }

  /// Variant stored in a blob tag; `RibbonWithFallback` is never stored
  /// blob 标签中存储的变体；`RibbonWithFallback` 不会被存储
  #[inline]
  pub fn from_id(id: u8) -> Option<Self> {
    Self::ALL
      .iter()
      .copied()
      .find(|f| *f as u8 == id && *f != Family::RibbonWithFallback)
  }

  #[inline]
  pub fn id(self) -> u8 {
    self as u8
  }

  pub fn kind(self) -> Kind {
    match self {
      Family::Xor8 | Family::Xor16 => Kind::Xor,
      Family::XorPlus8 | Family::XorPlus16 => Kind::XorPlus,
      Family::BinaryFuse8 | Family::BinaryFuse16 => Kind::BinaryFuse,
      Family::BlockedBloom => Kind::BlockedBloom,
      Family::Cuckoo8 | Family::Cuckoo12 | Family::Cuckoo16 => Kind::Cuckoo,
      Family::Vacuum8 | Family::Vacuum12 | Family::Vacuum16 => Kind::Vacuum { packed: false },
      Family::Vacuum8Packed | Family::Vacuum12Packed | Family::Vacuum16Packed => {
        Kind::Vacuum { packed: true }
      }
      Family::Ribbon => Kind::Ribbon { fallback: false },
      Family::RibbonWithFallback => Kind::Ribbon { fallback: true },
    }
  }

  /// Fingerprint bits for cuckoo / vacuum variants
  /// cuckoo / vacuum 变体的指纹位数
  pub(crate) fn fp_bits(self) -> u8 {
    match self {
      Family::Cuckoo8 | Family::Vacuum8 => 8,
      Family::Cuckoo12 | Family::Vacuum12 => 12,
      Family::Cuckoo16 | Family::Vacuum16 => 16,
      Family::Vacuum8Packed => 9,
      Family::Vacuum12Packed => 13,
      Family::Vacuum16Packed => 17,
      _ => 0,
    }
  }
}
