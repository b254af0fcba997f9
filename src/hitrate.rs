/// Cache hit-rate models.
///
/// Two statistical estimators of the probability that a memory reference is
/// served by a given cache level. The Gaussian reuse-distance estimator
/// needs only the mean and spread of the reuse distance; the stack-distance
/// estimator consumes a full distance histogram and models set-associative
/// replacement pressure with a binomial tail. Misses at one level form the
/// reference population of the next, so per-level rates compose into an
/// effective cycle cost for the whole hierarchy.
use crate::machine::CacheLevel;

// ---------------------------------------------------------------------------
// erf
// ---------------------------------------------------------------------------

/// Error function, Abramowitz–Stegun 7.1.26 polynomial. Absolute error is
/// below 1.5e-7, well inside the fidelity of the cache model itself.
pub fn erf(x: f64) -> f64 {
    const P: f64 = 0.3275911;
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

// ---------------------------------------------------------------------------
// Gaussian reuse-distance estimator
// ---------------------------------------------------------------------------

/// Hit rate of one level given mean and standard deviation of the reuse
/// distance, assuming normally distributed distances: the probability that
/// the working set spanned by the reuse distance fits in the level's lines.
pub fn reuse_hit_rate(level: &CacheLevel, avg_reuse_dist: f64, stdev_reuse_dist: f64) -> f64 {
    let nlines = level.lines();
    let nvars = avg_reuse_dist / level.line_size;
    let vvars = (2.0 * (stdev_reuse_dist / level.line_size).powi(2)).sqrt();
    if vvars == 0.0 {
        // Exact distance, fit is all or nothing.
        return if nvars <= nlines { 1.0 } else { 0.0 };
    }
    0.5 * (1.0 + erf((nlines - nvars) / vvars))
}

// ---------------------------------------------------------------------------
// Stack-distance estimator
// ---------------------------------------------------------------------------

/// n choose m on floats; remapped sentinel distances reach cache-capacity
/// magnitudes that no integer binomial would survive.
pub fn ncr(n: f64, m: u32) -> f64 {
    if f64::from(m) > n {
        return 0.0;
    }
    let mut r = 1.0;
    for j in 1..=m {
        let j = f64::from(j);
        r *= (n - f64::from(m) + j) / j;
    }
    r
}

/// Probability that a reference with stack distance `d` hits in `level`.
///
/// Distances within the associativity decay geometrically with the line
/// count; beyond it, the binomial tail over the `A` ways models replacement
/// pressure. The sentinel `d == -1.0` marks a cold reference and is remapped
/// to the last-level capacity, which lands it deep in the always-miss regime.
pub fn hit_given_distance(d: f64, level: &CacheLevel, llc_size: f64) -> f64 {
    let assoc = level.associativity;
    let b = level.lines();
    let mut d = d;
    let mut p = 0.0;
    if d <= assoc {
        if d == -1.0 {
            d = llc_size;
        } else if d == 0.0 {
            p = 1.0;
        } else {
            p = (1.0 - 1.0 / b).powf(d);
        }
    }
    // Not an `else`: the sentinel remap above pushes d past the associativity.
    if d > assoc {
        for a in 0..assoc as u32 {
            p += ncr(d, a)
                * (assoc / b).powi(a as i32)
                * (1.0 - assoc / b).powf(d - f64::from(a));
        }
    }
    p
}

/// Expected hit rate of a level over a stack-distance histogram:
/// `Σ p(d) · p(hit | d)`.
pub fn distribution_hit_rate(
    distances: &[f64],
    probabilities: &[f64],
    level: &CacheLevel,
    llc_size: f64,
) -> f64 {
    distances
        .iter()
        .zip(probabilities)
        .map(|(&d, &pd)| pd * hit_given_distance(d, level, llc_size))
        .sum()
}

// ---------------------------------------------------------------------------
// Hierarchy composition
// ---------------------------------------------------------------------------

/// Effective cycles of a reference through the chained hierarchy: each
/// level serves its hit fraction at its own cost and forwards the misses,
/// with `ram_penalty` as the innermost term. `level_cycles` pairs with
/// `hit_rates` innermost-first; either latency cycles or bandwidth cycles
/// fit, the fold does not care which cost it composes.
pub fn effective_cycles(hit_rates: &[f64], level_cycles: &[f64], ram_penalty: f64) -> f64 {
    let mut eff = ram_penalty;
    for (p, c) in hit_rates.iter().zip(level_cycles).rev() {
        eff = c * p + (1.0 - p) * eff;
    }
    eff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l1() -> CacheLevel {
        CacheLevel {
            size: 65536.0,
            line_size: 64.0,
            cycles: 4.0,
            associativity: 8.0,
            bandwidth_cycles: 0.5,
        }
    }

    const LLC: f64 = 12.0 * 1024.0 * 1024.0;

    #[test]
    fn erf_matches_reference_values() {
        assert!(erf(0.0).abs() < 1e-12);
        assert!((erf(1.0) - 0.8427007929).abs() < 2e-7);
        assert!((erf(-1.0) + 0.8427007929).abs() < 2e-7);
        assert!((erf(3.0) - 0.9999779095).abs() < 2e-7);
        assert!((erf(20.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_distance_always_hits() {
        assert!((hit_given_distance(0.0, &l1(), LLC) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rate_stays_in_unit_interval() {
        for d in [0.0, 1.0, 4.0, 8.0, 9.0, 64.0, 1024.0, 1.0e6, -1.0] {
            let p = hit_given_distance(d, &l1(), LLC);
            assert!((0.0..=1.0).contains(&p), "d={d} gave {p}");
        }
    }

    #[test]
    fn geometric_branch_decays_with_distance() {
        let p1 = hit_given_distance(1.0, &l1(), LLC);
        let p4 = hit_given_distance(4.0, &l1(), LLC);
        let p8 = hit_given_distance(8.0, &l1(), LLC);
        assert!(p1 > p4 && p4 > p8);
    }

    #[test]
    fn huge_distance_never_hits() {
        assert!(hit_given_distance(1.0e6, &l1(), LLC) < 1e-6);
    }

    #[test]
    fn cold_sentinel_equals_llc_distance() {
        let sentinel = hit_given_distance(-1.0, &l1(), LLC);
        let explicit = hit_given_distance(LLC, &l1(), LLC);
        assert!((sentinel - explicit).abs() < 1e-12);
    }

    #[test]
    fn distribution_weights_by_probability() {
        // Half the references have distance 0 (certain hits), half are cold.
        let r = distribution_hit_rate(&[0.0, -1.0], &[0.5, 0.5], &l1(), LLC);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reuse_rate_is_half_at_capacity() {
        let lvl = l1();
        // Mean reuse distance exactly fills the level.
        let avg = lvl.lines() * lvl.line_size;
        let r = reuse_hit_rate(&lvl, avg, 128.0);
        assert!((r - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reuse_rate_steps_when_spread_is_zero() {
        let lvl = l1();
        let fits = lvl.lines() * lvl.line_size;
        assert!((reuse_hit_rate(&lvl, fits, 0.0) - 1.0).abs() < 1e-12);
        assert!(reuse_hit_rate(&lvl, fits + 64.0, 0.0).abs() < 1e-12);
    }

    #[test]
    fn effective_cycles_collapse_at_extremes() {
        let cycles = [4.0, 10.0, 65.0];
        let all_hit = effective_cycles(&[1.0, 1.0, 1.0], &cycles, 144.0);
        let all_miss = effective_cycles(&[0.0, 0.0, 0.0], &cycles, 144.0);
        assert!((all_hit - 4.0).abs() < 1e-12);
        assert!((all_miss - 144.0).abs() < 1e-12);
    }

    #[test]
    fn effective_cycles_interpolate() {
        let eff = effective_cycles(&[0.5, 1.0, 1.0], &[4.0, 10.0, 65.0], 144.0);
        // Half served at 4 cycles, the rest at the L2 cost.
        assert!((eff - (0.5 * 4.0 + 0.5 * 10.0)).abs() < 1e-12);
    }
}
