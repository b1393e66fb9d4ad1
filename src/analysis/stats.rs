//! 系列統計の小さなヘルパー（空入力では None）

pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

/// 母分散
pub fn variance(values: &[f32]) -> Option<f32> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32)
}

/// 母標準偏差
pub fn std_dev(values: &[f32]) -> Option<f32> {
    variance(values).map(f32::sqrt)
}

pub fn max(values: &[f32]) -> Option<f32> {
    values.iter().copied().reduce(f32::max)
}

pub fn min(values: &[f32]) -> Option<f32> {
    values.iter().copied().reduce(f32::min)
}

/// ピアソン相関係数
///
/// 2点未満、長さ不一致、分散0のときは None。
pub fn pearson(xs: &[f32], ys: &[f32]) -> Option<f32> {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut sxy = 0.0f64;
    let mut sxx = 0.0f64;
    let mut syy = 0.0f64;
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let dx = (x - mx) as f64;
        let dy = (y - my) as f64;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom < 1e-12 {
        return None;
    }
    let r = (sxy / denom).clamp(-1.0, 1.0) as f32;
    r.is_finite().then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v).unwrap() - 5.0).abs() < 1e-6);
        assert!((std_dev(&v).unwrap() - 2.0).abs() < 1e-6);
        assert!(mean(&[]).is_none());
        assert!(std_dev(&[]).is_none());
    }

    #[test]
    fn test_min_max() {
        let v = [3.0, -1.0, 8.5];
        assert_eq!(max(&v), Some(8.5));
        assert_eq!(min(&v), Some(-1.0));
        assert_eq!(max(&[]), None);
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-6);

        let neg = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &neg).unwrap() + 1.0).abs() < 1e-6);

        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&x, &y[..3]).is_none());
    }
}
