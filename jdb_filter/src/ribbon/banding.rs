//! Incremental banding of 64-wide coefficient rows
//! 64 位宽系数行的增量带状消元

/// Band matrix of one shard; an empty slot holds coefficient 0
/// 单个分片的带状矩阵；空槽系数为 0
pub(crate) struct Band<'b> {
  pub coeff: &'b mut [u64],
  pub result: &'b mut [u32],
}

impl Band<'_> {
  /// Add a row whose leading one sits at `start`. Returns false when the
  /// row reduces to `0 = r` with `r != 0`.
  /// 添加首个 1 位于 `start` 的行。若行化简为 `0 = r` 且 `r != 0` 则返回 false。
  #[inline]
  pub fn add(&mut self, start: usize, cr: u64, rr: u32) -> bool {
    debug_assert_eq!(cr & 1, 1);
    let mut i = start;
    let mut cr = cr;
    let mut rr = rr;
    loop {
      let other = self.coeff[i];
      if other == 0 {
        self.coeff[i] = cr;
        self.result[i] = rr;
        return true;
      }
      cr ^= other;
      rr ^= self.result[i];
      if cr == 0 {
        return rr == 0;
      }
      let tz = cr.trailing_zeros();
      i += tz as usize;
      cr >>= tz;
    }
  }

  pub fn clear(&mut self) {
    self.coeff.fill(0);
    self.result.fill(0);
  }
}
