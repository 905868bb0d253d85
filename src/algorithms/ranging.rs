/// RSSI 到距离转换模型
///
/// 简单的对数距离路径损耗近似：d = sqrt(10^((P_ref - RSSI) / 10))，单位米。
/// 这不是拟合曲线，精度取决于接收设备和信标型号。

/// 根据参考功率和实测信号强度估计距离（米）
///
/// 参考功率缺失、为 0 或信号强度为 0 时距离未知，返回 `None`。
/// 调用方必须单独处理未知距离，不能当作“很远但有限”。
pub fn estimate_distance(reference_power: Option<i16>, signal_strength: f64) -> Option<f64> {
    let power = reference_power.filter(|p| *p != 0)?;
    if signal_strength == 0.0 {
        return None;
    }

    let ratio = power as f64 - signal_strength;
    let linear = 10_f64.powf(ratio / 10.0);
    Some(linear.sqrt())
}

/// 根据距离反推预期的信号强度 (dBm)
pub fn expected_signal_strength(reference_power: i16, distance: f64) -> f64 {
    if distance <= 0.0 {
        return f64::INFINITY;
    }
    reference_power as f64 - 20.0 * distance.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_inputs() {
        assert_eq!(estimate_distance(None, -70.0), None);
        assert_eq!(estimate_distance(Some(0), -70.0), None);
        assert_eq!(estimate_distance(Some(-60), 0.0), None);
    }

    #[test]
    fn test_reference_distance() {
        assert_eq!(estimate_distance(Some(-60), -60.0), Some(1.0));
        assert_eq!(estimate_distance(Some(-41), -41.0), Some(1.0));
    }

    #[test]
    fn test_distance_grows_with_loss() {
        // 每 20 dB 损耗距离扩大 10 倍
        let d = estimate_distance(Some(-60), -80.0).unwrap();
        assert!((d - 10.0).abs() < 1e-9);

        let near = estimate_distance(Some(-60), -65.0).unwrap();
        let far = estimate_distance(Some(-60), -75.0).unwrap();
        assert!(near < far);
    }

    #[test]
    fn test_inverse() {
        let rssi = expected_signal_strength(-60, 4.0);
        let d = estimate_distance(Some(-60), rssi).unwrap();
        assert!((d - 4.0).abs() < 1e-9);
    }
}
