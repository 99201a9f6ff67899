//! Error types for jdb_filter
//! jdb_filter 错误类型定义

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("Filter blob too short: need {need} bytes, got {got}")]
  TooShort { need: usize, got: usize },

  #[error("Unknown filter tag {0:#04x}")]
  UnknownTag(u8),

  #[error("Unsupported filter blob version {0}")]
  Version(u8),

  #[error("Filter blob length mismatch: expected {expected}, got {actual}")]
  LenMismatch { expected: usize, actual: usize },

  #[error("Invalid filter field: {0}")]
  InvalidField(&'static str),

  /// Eviction chain ran past the kick budget, table is not consistent
  /// 踢出链超过上限，表不一致
  #[error("Eviction chain exceeded {kicks} kicks")]
  EvictionExceeded { kicks: usize },

  #[error("Ribbon banding unsolvable")]
  Unsolvable,

  #[error("Key count {count} outside ribbon range {min}..={max}")]
  KeyCount { count: usize, min: usize, max: usize },

  /// Peeling failed on every seed; the dispatcher turns this into a degraded blob
  /// 所有种子剥离均失败；分发器将其转为降级 blob
  #[error("Peeling failed after {tries} seeds")]
  PeelExhausted { tries: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
