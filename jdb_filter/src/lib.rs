#![cfg_attr(docsrs, feature(doc_cfg))]

//! Approximate membership filters persisted as self-describing blobs
//! 以自描述 blob 持久化的近似成员过滤器
//!
//! ```
//! use jdb_filter::{Conf, Kind, hash64};
//!
//! let keys: Vec<u64> = ["a", "b", "c"].iter().map(|k| hash64(k.as_bytes())).collect();
//! let built = jdb_filter::build(&keys, &[Conf::Kind(Kind::Xor)]).unwrap();
//! assert!(jdb_filter::query_key(&built.blob, b"a").unwrap());
//! ```

mod blob;
mod bloom;
mod conf;
mod cuckoo;
mod error;
mod family;
mod filter;
mod hash;
mod policy;
mod ribbon;
mod xorf;

pub use blob::Blob;
pub use bloom::Bloom;
pub use conf::{Conf, Config, default};
pub use cuckoo::{Cuckoo, Vacuum};
pub use error::{Error, Result};
pub use family::{Family, Kind};
pub use filter::Filter;
pub use hash::hash64;
pub use policy::{Built, Outcome, Policy};
pub use ribbon::Ribbon;
pub use xorf::{Fp, Fuse, Xor, XorPlus};

/// Build a blob for `hashes`
/// 为 `hashes` 构建 blob
///
/// An empty input gives an empty blob. `Err` means no safe blob exists
/// (eviction overflow, unsolvable ribbon without fallback).
/// 空输入得到空 blob。`Err` 表示无法生成安全的 blob（踢出溢出、无回退的 ribbon 无解）。
pub fn build(hashes: &[u64], conf: &[Conf]) -> Result<Built> {
  Policy::from(conf).build(hashes)
}

/// Append a blob for `hashes` to `dst`
/// 将 `hashes` 的 blob 追加到 `dst`
pub fn build_into(dst: &mut Vec<u8>, hashes: &[u64], conf: &[Conf]) -> Result<Outcome> {
  Policy::from(conf).build_into(dst, hashes)
}

/// Reconstruct a view over `blob` without copying it
/// 在 `blob` 上重建视图，不复制
#[inline]
pub fn decode(blob: &[u8]) -> Result<Blob<'_>> {
  Blob::decode(blob)
}

/// Maybe present for `Ok(true)`, definitely absent for `Ok(false)`
/// `Ok(true)` 表示可能存在，`Ok(false)` 表示一定不存在
#[inline]
pub fn query(blob: &[u8], hash: u64) -> Result<bool> {
  Ok(Blob::decode(blob)?.may_contain(hash))
}

/// Hash `key` with [`hash64`] and query
/// 用 [`hash64`] 哈希 `key` 后查询
#[inline]
pub fn query_key(blob: &[u8], key: &[u8]) -> Result<bool> {
  query(blob, hash64(key))
}
