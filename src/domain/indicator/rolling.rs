//! Rolling-window and recursive smoothing primitives over columns.
//!
//! Every function reads only bars `<= i` when producing bar `i`. A window that
//! contains an undefined input produces no value.

use crate::domain::series::Column;

fn rolling(values: &[Option<f64>], window: usize, f: impl Fn(&[f64]) -> f64) -> Column {
    let mut out = Vec::with_capacity(values.len());
    let mut buf = Vec::with_capacity(window);
    for i in 0..values.len() {
        if window == 0 || i + 1 < window {
            out.push(None);
            continue;
        }
        buf.clear();
        let complete = values[i + 1 - window..=i].iter().all(|v| match v {
            Some(x) => {
                buf.push(*x);
                true
            }
            None => false,
        });
        out.push(complete.then(|| f(&buf)));
    }
    out
}

pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, |w| w.iter().sum())
}

/// Arithmetic mean of the last `window` values; undefined for the first
/// `window - 1` bars.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Sample standard deviation (n - 1 denominator). Needs `window >= 2`.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Column {
    if window < 2 {
        return vec![None; values.len()];
    }
    rolling(values, window, |w| {
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let ss: f64 = w.iter().map(|x| (x - mean) * (x - mean)).sum();
        (ss / (n - 1.0)).sqrt()
    })
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

/// Exponential smoothing `s[i] = alpha * x[i] + (1 - alpha) * s[i-1]`, seeded
/// with the first defined value. Leading gaps stay undefined; a gap after the
/// seed carries the previous smoothed value forward.
pub fn ewm(values: &[Option<f64>], alpha: f64) -> Column {
    let mut state: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            state = match (*v, state) {
                (Some(x), Some(prev)) => Some(alpha * x + (1.0 - alpha) * prev),
                (Some(x), None) => Some(x),
                (None, prev) => prev,
            };
            state
        })
        .collect()
}

/// EMA with smoothing factor `2 / (span + 1)`.
pub fn ema_span(values: &[Option<f64>], span: usize) -> Column {
    ewm(values, 2.0 / (span as f64 + 1.0))
}

/// Element-wise `a op b`, undefined where either side is undefined.
pub fn zip_with(a: &[Option<f64>], b: &[Option<f64>], f: impl Fn(f64, f64) -> f64) -> Column {
    a.iter()
        .zip(b)
        .map(|(x, y)| Some(f((*x)?, (*y)?)))
        .collect()
}

/// `a / b`, undefined where `b` is zero.
pub fn ratio(a: &[Option<f64>], b: &[Option<f64>]) -> Column {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let (x, y) = ((*x)?, (*y)?);
            (y != 0.0).then(|| x / y)
        })
        .collect()
}
