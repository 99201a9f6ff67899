use aok::{OK, Void};
use jdb_filter::{
  Blob, Conf, Error, Family, Kind, Outcome, Policy, build, build_into, decode, hash64, query,
  query_key,
};
use log::info;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn keys(prefix: &str, n: usize) -> Vec<u64> {
  (0..n)
    .map(|i| hash64(format!("{prefix}{i}").as_bytes()))
    .collect()
}

/// Families usable on any key count
/// 任意键数均可使用的族
fn general_families() -> impl Iterator<Item = Family> {
  Family::ALL.into_iter().filter(|f| *f != Family::Ribbon)
}

#[test]
fn test_xor8_three_keys() -> Void {
  let set: Vec<u64> = ["a", "b", "c"]
    .iter()
    .map(|k| hash64(k.as_bytes()))
    .collect();
  let built = build(&set, &[Conf::Kind(Kind::Xor), Conf::BitsPerKey(8)])?;
  assert_eq!(built.outcome, Outcome::Ok);
  assert_eq!(decode(&built.blob)?.family(), Some(Family::Xor8));

  for k in ["a", "b", "c"] {
    assert!(query_key(&built.blob, k.as_bytes())?);
  }

  let blob = decode(&built.blob)?;
  let mut fp = 0;
  for i in 0..100_000 {
    if blob.may_contain(hash64(format!("absent-{i}").as_bytes())) {
      fp += 1;
    }
  }
  info!("xor8 3 keys false positives {fp} / 100000");
  // 1/256 of 100000 is about 390
  assert!((200..=600).contains(&fp), "fp {fp}");
  OK
}

#[test]
fn test_no_false_negatives() -> Void {
  let li = keys("key", 10_000);
  for family in Family::ALL {
    for seed in [1, 2] {
      let built = build(&li, &[Conf::Family(family), Conf::Seed(seed)])?;
      assert_eq!(built.outcome, Outcome::Ok, "{family:?}");
      let blob = decode(&built.blob)?;
      for &k in &li {
        assert!(blob.may_contain(k), "{family:?} seed {seed}");
      }
    }
  }
  OK
}

#[test]
fn test_small_sets() -> Void {
  for n in [1, 2, 3, 17, 255] {
    let li = keys("small", n);
    for family in general_families() {
      let built = build(&li, &[Conf::Family(family)])?;
      let blob = decode(&built.blob)?;
      if family == Family::RibbonWithFallback {
        assert!(blob.is_fallback() || blob.is_always_true());
      }
      assert!(li.iter().all(|&k| blob.may_contain(k)), "{family:?} n {n}");
    }
  }
  OK
}

#[test]
fn test_duplicate_hashes() -> Void {
  let mut li = keys("dup", 1000);
  li.extend_from_slice(&li.clone());
  li.extend_from_slice(&li[..10].to_vec());
  for family in general_families() {
    let built = build(&li, &[Conf::Family(family)])?;
    let blob = decode(&built.blob)?;
    assert!(li.iter().all(|&k| blob.may_contain(k)), "{family:?}");
  }
  OK
}

#[test]
fn test_round_trip_equivalence() -> Void {
  let li = keys("rt", 20_000);
  for family in Family::ALL {
    let policy = Policy::from(&[Conf::Family(family), Conf::Seed(99)][..]);
    let (owned, outcome) = policy.build_blob(&li)?;
    assert_eq!(outcome, Outcome::Ok);

    let mut buf = Vec::new();
    owned.encode(&mut buf);
    assert_eq!(buf.len(), owned.size());
    let view = Blob::decode(&buf)?;
    assert_eq!(view.family(), owned.family());
    for i in 0..50_000u64 {
      let h = hash64(&i.to_le_bytes());
      assert_eq!(view.may_contain(h), owned.may_contain(h), "{family:?}");
    }
  }
  OK
}

#[test]
fn test_false_positive_rate() -> Void {
  let li = keys("fpr", 100_000);
  let absent = keys("absent", 100_000);
  for family in [
    Family::Xor8,
    Family::XorPlus8,
    Family::BinaryFuse8,
    Family::Ribbon,
  ] {
    let built = build(&li, &[Conf::Family(family), Conf::BitsPerKey(8)])?;
    let blob = decode(&built.blob)?;
    let fp = absent.iter().filter(|&&k| blob.may_contain(k)).count();
    let bits = built.blob.len() as f64 * 8.0 / li.len() as f64;
    info!("{family:?} fp {fp} bits/key {bits:.2}");
    // 1/256 within 20%
    assert!((312..=468).contains(&fp), "{family:?} fp {fp}");
  }

  for family in [
    Family::Xor16,
    Family::XorPlus16,
    Family::BinaryFuse16,
    Family::Cuckoo16,
    Family::Vacuum16,
    Family::Vacuum16Packed,
  ] {
    let built = build(&li, &[Conf::Family(family)])?;
    let blob = decode(&built.blob)?;
    let fp = absent.iter().filter(|&&k| blob.may_contain(k)).count();
    info!("{family:?} fp {fp}");
    assert!(fp < 100, "{family:?} fp {fp}");
  }

  for (family, limit) in [
    (Family::BlockedBloom, 6_000),
    (Family::Cuckoo8, 5_000),
    (Family::Vacuum8, 5_000),
  ] {
    let built = build(&li, &[Conf::Family(family), Conf::BitsPerKey(8)])?;
    let blob = decode(&built.blob)?;
    let fp = absent.iter().filter(|&&k| blob.may_contain(k)).count();
    info!("{family:?} fp {fp}");
    assert!(fp < limit, "{family:?} fp {fp}");
  }
  OK
}

#[test]
fn test_empty() -> Void {
  let built = build(&[], &[])?;
  assert!(built.blob.is_empty());
  assert_eq!(built.outcome, Outcome::Ok);

  assert!(query(&[], 0)?);
  assert!(query_key(&[], b"anything")?);
  assert!(decode(&[])?.is_empty());
  OK
}

#[test]
fn test_cuckoo_overflow_fails() -> Void {
  let li: Vec<u64> = (0..1_000_000u64).map(|i| hash64(&i.to_le_bytes())).collect();
  let r = build(&li, &[Conf::Kind(Kind::Cuckoo), Conf::Capacity(1000)]);
  assert!(matches!(r, Err(Error::EvictionExceeded { .. })), "{r:?}");

  let r = build(
    &li,
    &[Conf::Kind(Kind::Vacuum { packed: true }), Conf::Capacity(1000)],
  );
  assert!(matches!(r, Err(Error::EvictionExceeded { .. })), "{r:?}");
  OK
}

#[test]
fn test_build_into_offset() -> Void {
  let li = keys("off", 5000);
  let mut dst = b"block-data".to_vec();
  let outcome = build_into(&mut dst, &li, &[Conf::Kind(Kind::BlockedBloom)])?;
  assert_eq!(outcome, Outcome::Ok);
  assert_eq!(&dst[..10], b"block-data");
  let blob = decode(&dst[10..])?;
  assert_eq!(blob.family(), Some(Family::BlockedBloom));
  assert!(li.iter().all(|&k| blob.may_contain(k)));
  OK
}

#[test]
fn test_truncated_blobs_rejected() -> Void {
  let li = keys("trunc", 3000);
  for family in Family::ALL {
    let built = build(&li, &[Conf::Family(family)])?;
    let full = &built.blob;
    for cut in (1..full.len()).step_by(full.len() / 97 + 1) {
      assert!(decode(&full[..cut]).is_err(), "{family:?} cut {cut}");
    }
    let mut longer = full.clone();
    longer.push(0);
    assert!(
      matches!(decode(&longer), Err(Error::LenMismatch { .. })),
      "{family:?}"
    );
  }
  OK
}

#[test]
fn test_corrupt_blobs_never_panic() -> Void {
  let li = keys("corrupt", 2000);
  let mut rng = fastrand::Rng::with_seed(5);
  for family in Family::ALL {
    let built = build(&li, &[Conf::Family(family)])?;
    for _ in 0..200 {
      let mut bad = built.blob.clone();
      let n = rng.usize(1..4);
      for _ in 0..n {
        let i = rng.usize(..bad.len().min(40));
        bad[i] = rng.u8(..);
      }
      if let Ok(blob) = decode(&bad) {
        for &k in &li[..50] {
          let _ = blob.may_contain(k);
        }
      }
    }
  }
  OK
}

#[test]
fn test_seeds_differ() -> Void {
  let li = keys("seed", 5000);
  let a = build(&li, &[Conf::Kind(Kind::BinaryFuse), Conf::Seed(1)])?;
  let b = build(&li, &[Conf::Kind(Kind::BinaryFuse), Conf::Seed(2)])?;
  assert_ne!(a.blob, b.blob);
  let c = build(&li, &[Conf::Kind(Kind::BinaryFuse), Conf::Seed(1)])?;
  assert_eq!(a.blob, c.blob);
  for blob in [&a.blob, &b.blob] {
    let blob = decode(blob)?;
    assert!(li.iter().all(|&k| blob.may_contain(k)));
  }
  OK
}

#[test]
fn test_bits_per_key_picks_variant() -> Void {
  let li = keys("bits", 1000);
  for (kind, bits, want) in [
    (Kind::Xor, 8, Family::Xor8),
    (Kind::Xor, 16, Family::Xor16),
    (Kind::XorPlus, 8, Family::XorPlus8),
    (Kind::BinaryFuse, 20, Family::BinaryFuse16),
    (Kind::Cuckoo, 12, Family::Cuckoo12),
    (Kind::Vacuum { packed: false }, 16, Family::Vacuum16),
    (Kind::Vacuum { packed: true }, 12, Family::Vacuum12Packed),
  ] {
    let built = build(&li, &[Conf::Kind(kind), Conf::BitsPerKey(bits)])?;
    assert_eq!(decode(&built.blob)?.family(), Some(want));
  }
  OK
}

#[test]
fn test_ribbon_fallback_tag() -> Void {
  let few = keys("few", 100);
  let built = build(
    &few,
    &[Conf::Kind(Kind::Ribbon { fallback: true }), Conf::BitsPerKey(8)],
  )?;
  assert_eq!(built.outcome, Outcome::Ok);
  assert_eq!(built.blob[0], 0x80 | Family::BinaryFuse8 as u8);
  let blob = decode(&built.blob)?;
  assert!(blob.is_fallback());
  assert!(few.iter().all(|&k| blob.may_contain(k)));

  let r = build(&few, &[Conf::Kind(Kind::Ribbon { fallback: false })]);
  assert!(matches!(r, Err(Error::KeyCount { count: 100, .. })));

  let built = build(
    &few,
    &[
      Conf::Kind(Kind::Ribbon { fallback: false }),
      Conf::RibbonMinKeys(64),
    ],
  )?;
  assert_eq!(decode(&built.blob)?.family(), Some(Family::Ribbon));
  OK
}

#[test]
fn test_size_reported() -> Void {
  let li = keys("size", 10_000);
  let built = build(&li, &[Conf::Kind(Kind::BinaryFuse)])?;
  let blob = decode(&built.blob)?;
  assert_eq!(blob.size(), built.blob.len());
  let body = blob.filter().map(|f| f.size()).unwrap_or(0);
  assert_eq!(body + 2, built.blob.len());
  // about 1.125 bytes per key
  assert!(body > 10_000 && body < 15_000, "{body}");
  OK
}
