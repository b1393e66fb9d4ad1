use nalgebra::{DMatrix, DVector};

/// 滑らかさ評価用の窓幅
///
/// 系列長のおよそ1/4の奇数、上限 max_window、下限3。
pub fn smoothing_window(len: usize, max_window: usize) -> usize {
    let window = (len / 4 * 2 + 1).min(max_window);
    window.max(3)
}

/// Savitzky-Golay 平滑化
///
/// 窓内の点に最小二乗で多項式を当てはめ、中心の値で置き換える。
/// 両端の半窓は、先頭/末尾の窓に当てはめた多項式をそのまま評価する。
/// 窓が偶数・系列より長い・次数が窓以上の場合は入力をそのまま返す。
pub fn savgol_filter(data: &[f32], window: usize, poly_order: usize) -> Vec<f32> {
    let n = data.len();
    if window % 2 == 0 || window > n || poly_order >= window {
        return data.to_vec();
    }
    let half = window / 2;

    // 位置 -half..=half のヴァンデルモンド行列
    let vandermonde = DMatrix::<f64>::from_fn(window, poly_order + 1, |i, j| {
        (i as f64 - half as f64).powi(j as i32)
    });
    let pinv = match vandermonde.pseudo_inverse(1e-12) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("savgol pseudo-inverse failed: {}", e);
            return data.to_vec();
        }
    };

    let samples: Vec<f64> = data.iter().map(|&v| v as f64).collect();
    let mut out = vec![0.0f32; n];

    // 内部点: 係数行列の0行目（t=0での多項式値）との畳み込み
    for center in half..n - half {
        let mut acc = 0.0;
        for i in 0..window {
            acc += pinv[(0, i)] * samples[center - half + i];
        }
        out[center] = acc as f32;
    }

    // 端点: 先頭/末尾の窓の多項式を評価
    let fit = |start: usize| -> DVector<f64> {
        let segment = DVector::from_column_slice(&samples[start..start + window]);
        &pinv * segment
    };
    let eval = |coeffs: &DVector<f64>, t: f64| -> f64 {
        coeffs.iter().enumerate().map(|(j, c)| c * t.powi(j as i32)).sum()
    };

    let head = fit(0);
    for (k, value) in out.iter_mut().enumerate().take(half) {
        *value = eval(&head, k as f64 - half as f64) as f32;
    }
    let tail = fit(n - window);
    let tail_center = n - 1 - half;
    for (k, value) in out.iter_mut().enumerate().skip(n - half) {
        *value = eval(&tail, k as f64 - tail_center as f64) as f32;
    }

    out
}
