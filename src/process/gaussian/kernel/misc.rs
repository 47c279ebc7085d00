use nalgebra::base::constraint::{
    SameNumberOfColumns, SameNumberOfRows, ShapeConstraint,
};
use nalgebra::base::storage::Storage;
use nalgebra::{Dim, Matrix};

/// Squared Euclidean distance between `m1` and `m2` after dividing both by
/// `scale`.
#[inline]
pub fn e2_norm<R1, C1, S1, R2, C2, S2>(
    m1: &Matrix<f64, R1, C1, S1>,
    m2: &Matrix<f64, R2, C2, S2>,
    scale: f64,
) -> f64
where
    R1: Dim,
    C1: Dim,
    S1: Storage<f64, R1, C1>,
    R2: Dim,
    C2: Dim,
    S2: Storage<f64, R2, C2>,
    ShapeConstraint: SameNumberOfRows<R1, R2> + SameNumberOfColumns<C1, C2>,
{
    m1.zip_fold(m2, 0.0, |acc, a, b| {
        let diff = (a - b) / scale;
        diff.mul_add(diff, acc)
    })
}

/// Format `x` with `precision` significant digits the way C's `%g` does:
/// fixed notation for moderate exponents, scientific otherwise, trailing
/// zeros removed.
#[must_use]
pub fn format_g(x: f64, precision: usize) -> String {
    if !x.is_finite() {
        return format!("{x}");
    }
    if x == 0.0 {
        return "0".to_string();
    }

    let p = precision.max(1);
    let sci = format!("{:.*e}", p - 1, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_trailing_zeros(&mantissa),
            sign,
            exp.abs()
        )
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim_trailing_zeros(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
