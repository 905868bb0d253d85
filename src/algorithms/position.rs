/// 加权回归位置估计
///
/// 对每个坐标分量做加权线性回归：c = a + b * r，权重 1/r²（近处信标更可靠，
/// 主导拟合），然后取 r = 0 处的值作为位置。
///
/// 注意：这是尽力而为的估计，不是几何意义上正确的三边定位。
///
/// 回归方向是坐标对半径，而不是把半径拟合为 (x, y) 的多元函数后再反解。
/// 后一种做法在两个等距信标时退化，也不满足交换信标位置的对称性；
/// 这里的写法在等距时落在加权质心，共线信标的估计也留在同一直线上。

use super::Point;

/// 参与拟合的最小半径（米），避免零距离导致权重无穷大
pub const MIN_FIT_RADIUS: f64 = 0.1;

/// 根据 (兴趣点位置, 估计半径) 估计平面位置
///
/// 少于 2 个有效点时返回原点。半径没有差异时回归退化为加权质心。
pub fn estimate_position(points: &[(Point, f64)]) -> Point {
    let samples: Vec<(Point, f64, f64)> = points
        .iter()
        .filter(|(_, r)| r.is_finite())
        .map(|(p, r)| {
            let r = r.max(MIN_FIT_RADIUS);
            (*p, r, 1.0 / (r * r))
        })
        .collect();

    if samples.len() < 2 {
        return Point::ORIGIN;
    }

    let total_weight: f64 = samples.iter().map(|(_, _, w)| w).sum();
    let mean_r = samples.iter().map(|(_, r, w)| w * r).sum::<f64>() / total_weight;
    let spread: f64 = samples.iter().map(|(_, r, w)| w * (r - mean_r).powi(2)).sum();

    let fit = |coord: fn(&Point) -> f64| -> f64 {
        let mean_c = samples.iter().map(|(p, _, w)| w * coord(p)).sum::<f64>() / total_weight;
        if spread / total_weight < 1e-12 {
            return mean_c;
        }
        let covariance: f64 = samples
            .iter()
            .map(|(p, r, w)| w * (r - mean_r) * (coord(p) - mean_c))
            .sum();
        let slope = covariance / spread;
        mean_c - slope * mean_r
    };

    Point::new(fit(|p| p.x), fit(|p| p.y))
}
