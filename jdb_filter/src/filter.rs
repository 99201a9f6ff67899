//! Query-capable filter over owned or borrowed storage
//! 基于自有或借用存储、可查询的过滤器

use crate::{
  bloom::Bloom,
  conf::Config,
  cuckoo::{Cuckoo, Vacuum},
  error::{Error, Result},
  family::Family,
  hash::hash64,
  ribbon::Ribbon,
  xorf::{Fuse, Xor, XorPlus},
};

/// Built filter (`'static`) or view reconstructed from a blob (`'a`)
/// 构建出的过滤器（`'static`）或从 blob 重建的视图（`'a`）
#[derive(Debug, Clone)]
pub enum Filter<'a> {
  Xor8(Xor<'a, u8>),
  Xor16(Xor<'a, u16>),
  XorPlus8(XorPlus<'a, u8>),
  XorPlus16(XorPlus<'a, u16>),
  BinaryFuse8(Fuse<'a, u8>),
  BinaryFuse16(Fuse<'a, u16>),
  BlockedBloom(Bloom<'a>),
  Cuckoo(Cuckoo<'a>),
  Vacuum(Vacuum<'a>),
  Ribbon(Ribbon<'a>),
}

impl Filter<'static> {
  /// Run the construction algorithm of `family`; failures are returned as is
  /// 执行 `family` 的构建算法；失败原样返回
  pub fn build(family: Family, hashes: &[u64], conf: &Config, seed: u64) -> Result<Self> {
    let tries = conf.peel_tries;
    let kicks = conf.max_kicks;
    let cap = conf.capacity;
    Ok(match family {
      Family::Xor8 => Filter::Xor8(Xor::build(hashes, seed, tries)?),
      Family::Xor16 => Filter::Xor16(Xor::build(hashes, seed, tries)?),
      Family::XorPlus8 => Filter::XorPlus8(XorPlus::build(hashes, seed, tries)?),
      Family::XorPlus16 => Filter::XorPlus16(XorPlus::build(hashes, seed, tries)?),
      Family::BinaryFuse8 => Filter::BinaryFuse8(Fuse::build(hashes, seed, tries)?),
      Family::BinaryFuse16 => Filter::BinaryFuse16(Fuse::build(hashes, seed, tries)?),
      Family::BlockedBloom => {
        Filter::BlockedBloom(Bloom::build(hashes, conf.bits_per_key, seed)?)
      }
      Family::Cuckoo8 | Family::Cuckoo12 | Family::Cuckoo16 => {
        Filter::Cuckoo(Cuckoo::build(hashes, family.fp_bits() as u32, cap, seed, kicks)?)
      }
      Family::Vacuum8 | Family::Vacuum12 | Family::Vacuum16 => {
        Filter::Vacuum(Vacuum::build(hashes, family.fp_bits() as u32, false, cap, seed, kicks)?)
      }
      Family::Vacuum8Packed | Family::Vacuum12Packed | Family::Vacuum16Packed => Filter::Vacuum(
        Vacuum::build(hashes, family.fp_bits() as u32 - 1, true, cap, seed, kicks)?,
      ),
      Family::Ribbon | Family::RibbonWithFallback => Filter::Ribbon(Ribbon::build(
        hashes,
        conf.ribbon_milli_bits(),
        seed,
        conf.ribbon_min_keys,
      )?),
    })
  }
}

impl<'a> Filter<'a> {
  /// Concrete variant, as written in the blob tag
  /// 具体变体，即 blob 标签中的值
  pub fn family(&self) -> Family {
    match self {
      Filter::Xor8(_) => Family::Xor8,
      Filter::Xor16(_) => Family::Xor16,
      Filter::XorPlus8(_) => Family::XorPlus8,
      Filter::XorPlus16(_) => Family::XorPlus16,
      Filter::BinaryFuse8(_) => Family::BinaryFuse8,
      Filter::BinaryFuse16(_) => Family::BinaryFuse16,
      Filter::BlockedBloom(_) => Family::BlockedBloom,
      Filter::Cuckoo(f) => match f.fp_bits() {
        8 => Family::Cuckoo8,
        12 => Family::Cuckoo12,
        _ => Family::Cuckoo16,
      },
      // packed tables carry one extra fingerprint bit
      Filter::Vacuum(f) => match f.fp_bits() {
        8 => Family::Vacuum8,
        12 => Family::Vacuum12,
        16 => Family::Vacuum16,
        9 => Family::Vacuum8Packed,
        13 => Family::Vacuum12Packed,
        _ => Family::Vacuum16Packed,
      },
      Filter::Ribbon(_) => Family::Ribbon,
    }
  }

  /// Maybe present for true, definitely absent for false
  /// true 表示可能存在，false 表示一定不存在
  #[inline]
  pub fn may_contain(&self, hash: u64) -> bool {
    match self {
      Filter::Xor8(f) => f.may_contain(hash),
      Filter::Xor16(f) => f.may_contain(hash),
      Filter::XorPlus8(f) => f.may_contain(hash),
      Filter::XorPlus16(f) => f.may_contain(hash),
      Filter::BinaryFuse8(f) => f.may_contain(hash),
      Filter::BinaryFuse16(f) => f.may_contain(hash),
      Filter::BlockedBloom(f) => f.may_contain(hash),
      Filter::Cuckoo(f) => f.may_contain(hash),
      Filter::Vacuum(f) => f.may_contain(hash),
      Filter::Ribbon(f) => f.may_contain(hash),
    }
  }

  #[inline]
  pub fn may_contain_key(&self, key: &[u8]) -> bool {
    self.may_contain(hash64(key))
  }

  /// Parse a body written by `encode`, the variant must match `family`
  /// 解析 `encode` 写出的正文，变体须与 `family` 一致
  pub fn decode(family: Family, body: &'a [u8]) -> Result<Self> {
    let f = match family {
      Family::Xor8 => Filter::Xor8(Xor::decode(body)?),
      Family::Xor16 => Filter::Xor16(Xor::decode(body)?),
      Family::XorPlus8 => Filter::XorPlus8(XorPlus::decode(body)?),
      Family::XorPlus16 => Filter::XorPlus16(XorPlus::decode(body)?),
      Family::BinaryFuse8 => Filter::BinaryFuse8(Fuse::decode(body)?),
      Family::BinaryFuse16 => Filter::BinaryFuse16(Fuse::decode(body)?),
      Family::BlockedBloom => Filter::BlockedBloom(Bloom::decode(body)?),
      Family::Cuckoo8 | Family::Cuckoo12 | Family::Cuckoo16 => {
        Filter::Cuckoo(Cuckoo::decode(body)?)
      }
      Family::Vacuum8
      | Family::Vacuum12
      | Family::Vacuum16
      | Family::Vacuum8Packed
      | Family::Vacuum12Packed
      | Family::Vacuum16Packed => Filter::Vacuum(Vacuum::decode(body)?),
      Family::Ribbon => Filter::Ribbon(Ribbon::decode(body)?),
      Family::RibbonWithFallback => return Err(Error::UnknownTag(family.id())),
    };
    if f.family() != family {
      return Err(Error::InvalidField("family"));
    }
    Ok(f)
  }

  /// Append the body to `dst`
  /// 将正文追加到 `dst`
  pub fn encode(&self, dst: &mut Vec<u8>) {
    match self {
      Filter::Xor8(f) => f.encode(dst),
      Filter::Xor16(f) => f.encode(dst),
      Filter::XorPlus8(f) => f.encode(dst),
      Filter::XorPlus16(f) => f.encode(dst),
      Filter::BinaryFuse8(f) => f.encode(dst),
      Filter::BinaryFuse16(f) => f.encode(dst),
      Filter::BlockedBloom(f) => f.encode(dst),
      Filter::Cuckoo(f) => f.encode(dst),
      Filter::Vacuum(f) => f.encode(dst),
      Filter::Ribbon(f) => f.encode(dst),
    }
  }

  /// Encoded body size in bytes
  /// 编码后正文字节数
  pub fn size(&self) -> usize {
    match self {
      Filter::Xor8(f) => f.size(),
      Filter::Xor16(f) => f.size(),
      Filter::XorPlus8(f) => f.size(),
      Filter::XorPlus16(f) => f.size(),
      Filter::BinaryFuse8(f) => f.size(),
      Filter::BinaryFuse16(f) => f.size(),
      Filter::BlockedBloom(f) => f.size(),
      Filter::Cuckoo(f) => f.size(),
      Filter::Vacuum(f) => f.size(),
      Filter::Ribbon(f) => f.size(),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn family_mismatch_rejected() {
    let conf = Config::default();
    let keys: Vec<u64> = (0..1000).collect();
    let f = Filter::build(Family::Cuckoo12, &keys, &conf, 1).unwrap();
    assert_eq!(f.family(), Family::Cuckoo12);
    let mut body = Vec::new();
    f.encode(&mut body);
    assert!(Filter::decode(Family::Cuckoo12, &body).is_ok());
    assert_eq!(
      Filter::decode(Family::Cuckoo8, &body).unwrap_err(),
      Error::InvalidField("family")
    );
  }

  #[test]
  fn every_family_builds() {
    let conf = Config::default();
    let keys: Vec<u64> = (0..2000u64).map(|i| i * 7919).collect();
    for family in Family::ALL {
      let f = Filter::build(family, &keys, &conf, 42).unwrap();
      let want = if family == Family::RibbonWithFallback {
        Family::Ribbon
      } else {
        family
      };
      assert_eq!(f.family(), want);
      assert!(keys.iter().all(|&k| f.may_contain(k)), "{family:?}");
    }
  }

  #[test]
  fn key_bytes_hashed_like_query() {
    let names = ["alpha", "beta", "gamma", "delta"];
    let keys: Vec<u64> = names.iter().map(|k| hash64(k.as_bytes())).collect();
    let f = Filter::build(Family::XorPlus16, &keys, &Config::default(), 8).unwrap();
    for k in names {
      assert!(f.may_contain_key(k.as_bytes()));
    }
    let misses = (0..1000)
      .filter(|i| f.may_contain_key(format!("missing-{i}").as_bytes()))
      .count();
    assert!(misses < 5, "{misses}");
  }
}
