//! Family selection, degraded mode and ribbon fallback
//! 族选择、降级模式与 ribbon 回退

use crate::{
  blob::Blob,
  conf::{Conf, Config},
  error::{Error, Result},
  family::Family,
  filter::Filter,
};

/// Build result
/// 构建结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Ok,
  /// Peeling ran out of seeds, the blob matches every key
  /// 剥离用尽种子，blob 匹配所有键
  Degraded,
}

#[derive(Debug, Clone)]
pub struct Built {
  pub blob: Vec<u8>,
  pub outcome: Outcome,
}

/// Build dispatcher holding a resolved configuration
/// 持有解析后配置的构建分发器
#[derive(Debug, Clone, Default)]
pub struct Policy {
  pub config: Config,
}

impl From<&[Conf]> for Policy {
  fn from(conf: &[Conf]) -> Self {
    Self {
      config: Config::from(conf),
    }
  }
}

impl From<Config> for Policy {
  fn from(config: Config) -> Self {
    Self { config }
  }
}

impl Policy {
  pub fn family(&self) -> Family {
    self.config.family()
  }

  /// Build the blob without encoding it
  /// 构建 blob 但不编码
  pub fn build_blob(&self, hashes: &[u64]) -> Result<(Blob<'static>, Outcome)> {
    self.build_blob_with(hashes, Filter::build)
  }

  /// `build` runs one family's construction
  /// `build` 执行单个族的构建
  fn build_blob_with(
    &self,
    hashes: &[u64],
    build: impl Fn(Family, &[u64], &Config, u64) -> Result<Filter<'static>>,
  ) -> Result<(Blob<'static>, Outcome)> {
    if hashes.is_empty() {
      return Ok((Blob::Empty, Outcome::Ok));
    }
    let family = self.family();
    let seed = self.config.seed();
    match build(family, hashes, &self.config, seed) {
      Err(e @ (Error::KeyCount { .. } | Error::Unsolvable))
        if family == Family::RibbonWithFallback =>
      {
        let fallback = if self.config.ribbon_milli_bits() <= 8000 {
          Family::BinaryFuse8
        } else {
          Family::BinaryFuse16
        };
        log::warn!("ribbon unusable ({e}), falling back to {fallback:?}");
        let built = build(fallback, hashes, &self.config, seed);
        let (blob, outcome) = settle(fallback, hashes.len(), built)?;
        Ok(match blob {
          Blob::Primary(f) => (Blob::Fallback(f), outcome),
          blob => (blob, outcome),
        })
      }
      built => settle(family, hashes.len(), built),
    }
  }

  /// Append the blob for `hashes` to `dst`
  /// 将 `hashes` 的 blob 追加到 `dst`
  pub fn build_into(&self, dst: &mut Vec<u8>, hashes: &[u64]) -> Result<Outcome> {
    let (blob, outcome) = self.build_blob(hashes)?;
    let start = dst.len();
    blob.encode(dst);
    log::debug!(
      "filter {:?} keys {} bytes {} {outcome:?}",
      blob.family(),
      hashes.len(),
      dst.len() - start
    );
    Ok(outcome)
  }

  pub fn build(&self, hashes: &[u64]) -> Result<Built> {
    let mut blob = Vec::new();
    let outcome = self.build_into(&mut blob, hashes)?;
    Ok(Built { blob, outcome })
  }
}

/// Peel exhaustion becomes an always-true blob, other errors propagate
/// 剥离耗尽转为恒真 blob，其他错误向上传递
fn settle(
  family: Family,
  keys: usize,
  built: Result<Filter<'static>>,
) -> Result<(Blob<'static>, Outcome)> {
  match built {
    Ok(f) => Ok((Blob::Primary(f), Outcome::Ok)),
    Err(Error::PeelExhausted { tries }) => {
      log::warn!("{family:?} peeling failed after {tries} seeds over {keys} keys, degraded to always true");
      Ok((Blob::AlwaysTrue, Outcome::Degraded))
    }
    Err(e) => Err(e),
  }
}
