/// `n!` as a float. Exact up to `20!`, rounded above and infinite past
/// `170!`.
pub fn factorial(n: u64) -> f64 {
    (2..=n).fold(1.0, |acc, i| acc * i as f64)
}

/// Binomial coefficient `C(n, k)` as a float, 0 if `k > n`.
///
/// This is the number of distinct ways to pick `k` reactant tokens out of `n`.
pub fn binomial(n: u64, k: u64) -> f64 {
    if k > n {
        return 0.0;
    }

    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result *= (n - i) as f64;
        result /= (i + 1) as f64;
    }
    result
}

/// Removes the file extension and appends `_{suffix}` before re-adding it.
pub fn suffixed_path(path: &std::path::Path, suffix: impl std::fmt::Display) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    path.with_file_name(file_name)
}

#[test]
fn test_binomial() {
    assert_eq!(binomial(5, 2), 10.0);
    assert_eq!(binomial(5, 0), 1.0);
    assert_eq!(binomial(5, 5), 1.0);
    assert_eq!(binomial(2, 3), 0.0);
    assert_eq!(binomial(0, 0), 1.0);
}

#[test]
fn test_factorial() {
    assert_eq!(factorial(0), 1.0);
    assert_eq!(factorial(3), 6.0);
    assert_eq!(factorial(20), 2_432_902_008_176_640_000.0);
    assert_eq!(factorial(21), factorial(20) * 21.0);
    assert!((factorial(25) / 1.551_121_004_333_099e25 - 1.0).abs() < 1e-12);
}

#[test]
fn test_suffixed_path() {
    let path = std::path::Path::new("out/run.csv");
    assert_eq!(suffixed_path(path, 3), std::path::PathBuf::from("out/run_3.csv"));
    let path = std::path::Path::new("out/run");
    assert_eq!(suffixed_path(path, 1), std::path::PathBuf::from("out/run_1"));
}
