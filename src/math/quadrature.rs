/// Five-point Gauss–Legendre nodes on `[-1, 1]`.
const NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683,
    0.0,
    0.538_469_310_105_683,
    0.906_179_845_938_664,
];

/// Weights matching [`NODES`].
const WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189,
    0.478_628_670_499_366,
    0.568_888_888_888_889,
    0.478_628_670_499_366,
    0.236_926_885_056_189,
];

/// Recursion limit for adaptive subdivision.
const MAX_DEPTH: u32 = 16;

/// Integrates `f` over `[a, b]` with a single five-point Gauss–Legendre rule.
pub fn gauss_legendre<F>(f: &mut F, a: f64, b: f64) -> f64
where
    F: FnMut(f64) -> f64,
{
    let half = 0.5 * (b - a);
    let mid = 0.5 * (a + b);
    NODES
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(x, w)| w * f(mid + half * x))
        .sum::<f64>()
        * half
}

/// Integrates `f` over `[a, b]`, bisecting until the halves agree with the
/// whole interval to within `tolerance`.
///
/// Recursion stops at a fixed depth; the best estimate is returned then.
pub fn adaptive_gauss_legendre<F>(f: &mut F, a: f64, b: f64, tolerance: f64) -> f64
where
    F: FnMut(f64) -> f64,
{
    let whole = gauss_legendre(f, a, b);
    refine(f, a, b, whole, tolerance, 0)
}

fn refine<F>(f: &mut F, a: f64, b: f64, whole: f64, tolerance: f64, depth: u32) -> f64
where
    F: FnMut(f64) -> f64,
{
    let mid = 0.5 * (a + b);
    let left = gauss_legendre(f, a, mid);
    let right = gauss_legendre(f, mid, b);
    let split = left + right;
    if depth >= MAX_DEPTH || (split - whole).abs() <= tolerance {
        return split;
    }
    refine(f, a, mid, left, 0.5 * tolerance, depth + 1)
        + refine(f, mid, b, right, 0.5 * tolerance, depth + 1)
}
