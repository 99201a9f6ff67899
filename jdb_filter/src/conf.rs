//! Filter build configuration
//! 过滤器构建配置

use crate::family::{Family, Kind};

/// Filter build options
/// 过滤器构建选项
#[derive(Debug, Clone, Copy)]
pub enum Conf {
  /// Algorithm family, variant picked from bits per key
  /// 算法族，变体由每键位数决定
  Kind(Kind),

  /// Explicit variant, overrides `Kind`
  /// 显式变体，覆盖 `Kind`
  Family(Family),

  /// Target bits per key
  /// 目标每键位数
  BitsPerKey(u32),

  /// Ribbon space in thousandths of a bit per key
  /// Ribbon 每键空间（千分之一位）
  RibbonMilliBits(u32),

  /// Fixed seed, random per build when absent
  /// 固定种子，缺省时每次构建随机
  Seed(u64),

  /// Peeling retry budget
  /// 剥离重试次数
  PeelTries(u32),

  /// Eviction chain limit
  /// 踢出链长度上限
  MaxKicks(usize),

  /// Cuckoo / vacuum table sized for this many keys
  /// cuckoo / vacuum 表按此键数定容
  Capacity(usize),

  /// Ribbon falls back below this key count
  /// 键数低于此值时 Ribbon 回退
  RibbonMinKeys(usize),
}

/// Resolved configuration
/// 解析后的配置
#[derive(Debug, Clone)]
pub struct Config {
  pub kind: Kind,
  pub family: Option<Family>,
  pub bits_per_key: u32,
  pub ribbon_milli_bits: Option<u32>,
  pub seed: Option<u64>,
  pub peel_tries: u32,
  pub max_kicks: usize,
  pub capacity: Option<usize>,
  pub ribbon_min_keys: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      kind: default::KIND,
      family: None,
      bits_per_key: default::BITS_PER_KEY,
      ribbon_milli_bits: None,
      seed: None,
      peel_tries: default::PEEL_TRIES,
      max_kicks: default::MAX_KICKS,
      capacity: None,
      ribbon_min_keys: default::RIBBON_MIN_KEYS,
    }
  }
}

impl From<&[Conf]> for Config {
  fn from(conf_li: &[Conf]) -> Self {
    let mut config = Self::default();
    for &conf in conf_li {
      match conf {
        Conf::Kind(v) => config.kind = v,
        Conf::Family(v) => config.family = Some(v),
        Conf::BitsPerKey(v) => {
          let c = v.clamp(1, default::MAX_BITS_PER_KEY);
          if c != v {
            log::warn!("BitsPerKey {v} clamped to {c}");
          }
          config.bits_per_key = c;
        }
        Conf::RibbonMilliBits(v) => config.ribbon_milli_bits = Some(v),
        Conf::Seed(v) => config.seed = Some(v),
        Conf::PeelTries(v) => {
          if v == 0 {
            log::warn!("PeelTries 0 raised to 1");
          }
          config.peel_tries = v.max(1);
        }
        Conf::MaxKicks(v) => config.max_kicks = v,
        Conf::Capacity(v) => config.capacity = Some(v),
        Conf::RibbonMinKeys(v) => config.ribbon_min_keys = v,
      }
    }
    config
  }
}

impl Config {
  /// Concrete variant to build
  /// 要构建的具体变体
  pub fn family(&self) -> Family {
    self
      .family
      .unwrap_or_else(|| Family::pick(self.kind, self.bits_per_key))
  }

  /// Configured seed or a fresh random one
  /// 配置的种子，或新的随机种子
  pub fn seed(&self) -> u64 {
    self.seed.unwrap_or_else(|| fastrand::u64(..))
  }

  pub fn ribbon_milli_bits(&self) -> u32 {
    let v = self
      .ribbon_milli_bits
      .unwrap_or(self.bits_per_key.saturating_mul(1000));
    let c = v.clamp(default::RIBBON_MIN_MILLI_BITS, default::RIBBON_MAX_MILLI_BITS);
    if c != v {
      log::warn!("RibbonMilliBits {v} clamped to {c}");
    }
    c
  }
}

/// Default values
/// 默认值
pub mod default {
  use crate::family::Kind;

  pub const KIND: Kind = Kind::BinaryFuse;

  /// Bits per key
  /// 每键位数
  pub const BITS_PER_KEY: u32 = 8;
  pub const MAX_BITS_PER_KEY: u32 = 64;

  /// Peeling seeds tried before degrading
  /// 降级前尝试的剥离种子数
  pub const PEEL_TRIES: u32 = 100;

  /// Eviction chain limit
  /// 踢出链上限
  pub const MAX_KICKS: usize = 500;

  /// Ribbon key count range
  /// Ribbon 键数范围
  pub const RIBBON_MIN_KEYS: usize = 256;
  pub const RIBBON_MAX_KEYS: usize = 950_000_000;

  pub const RIBBON_MIN_MILLI_BITS: u32 = 1000;
  pub const RIBBON_MAX_MILLI_BITS: u32 = 32_000;

  /// Cuckoo table load limit
  /// Cuckoo 表负载上限
  pub const CUCKOO_LOAD: f64 = 0.96;

  /// Vacuum table target load
  /// Vacuum 表目标负载
  pub const VACUUM_LOAD: f64 = 0.9;
}
