/// 反馈输出（LED）
///
/// 引导循环通过 `FeedbackSink` 输出颜色和强度等级，
/// 具体硬件由调用方提供；`SimulatedLed` 只记录状态并输出日志。

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::algorithms::Color;
use crate::config::GameConfig;
use crate::error::{HuntError, Result};

/// 离散的强度等级
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FeedbackLevel {
    /// 按给定周期闪烁，周期越短越接近
    Pulse(Duration),
    /// 常亮：位于非目标参考点附近
    Steady,
    /// 到达目标
    Arrived,
}

impl FeedbackLevel {
    /// 由到目标的距离得出等级
    ///
    /// 阈值均为严格大于：R、0.75R、0.4R、到达半径，R 为最大可靠测距。
    pub fn for_distance(distance_to_goal: f64, at_goal: bool, config: &GameConfig) -> Self {
        let range = config.max_reliable_range_m;
        if distance_to_goal > range {
            FeedbackLevel::Pulse(Duration::from_secs(5))
        } else if distance_to_goal > range * 3.0 / 4.0 {
            FeedbackLevel::Pulse(Duration::from_secs(3))
        } else if distance_to_goal > range * 2.0 / 5.0 {
            FeedbackLevel::Pulse(Duration::from_secs(1))
        } else if distance_to_goal > config.arrival_radius_m {
            FeedbackLevel::Pulse(Duration::from_millis(500))
        } else if at_goal {
            FeedbackLevel::Arrived
        } else {
            FeedbackLevel::Steady
        }
    }

    /// 没有可靠信标时，按上一个参考点到目标的地图距离得出等级
    pub fn for_stale_reference(map_distance: f64) -> Self {
        if map_distance > 25.0 {
            FeedbackLevel::Pulse(Duration::from_secs(5))
        } else if map_distance > 15.0 {
            FeedbackLevel::Pulse(Duration::from_secs(3))
        } else if map_distance > 8.0 {
            FeedbackLevel::Pulse(Duration::from_secs(1))
        } else {
            FeedbackLevel::Arrived
        }
    }
}

/// 反馈输出设备
pub trait FeedbackSink: Send {
    fn initialize(&mut self) -> Result<()>;
    fn shutdown(&mut self);
    fn set_color(&mut self, color: Color);
    /// 临时覆盖颜色，`pop_color` 恢复
    fn push_color(&mut self, color: Color);
    /// 恢复上一个颜色，没有可恢复的颜色时返回 `false`
    fn pop_color(&mut self) -> bool;
    fn set_level(&mut self, level: FeedbackLevel);
}

/// 模拟 LED
#[derive(Debug, Default)]
pub struct SimulatedLed {
    initialized: bool,
    fail_on_init: bool,
    color: Color,
    stack: Vec<Color>,
    level: Option<FeedbackLevel>,
}

impl SimulatedLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初始化必定失败的 LED
    pub fn failing() -> Self {
        SimulatedLed {
            fail_on_init: true,
            ..Self::default()
        }
    }

    /// 当前显示的颜色（考虑临时覆盖）
    pub fn color(&self) -> Color {
        self.stack.last().copied().unwrap_or(self.color)
    }

    pub fn level(&self) -> Option<FeedbackLevel> {
        self.level
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 临时覆盖的层数
    pub fn pushed(&self) -> usize {
        self.stack.len()
    }
}

impl FeedbackSink for SimulatedLed {
    fn initialize(&mut self) -> Result<()> {
        if self.fail_on_init {
            return Err(HuntError::FeedbackInit("模拟 LED 不可用".to_string()));
        }
        self.initialized = true;
        info!("模拟 LED 已初始化");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.stack.clear();
        info!("模拟 LED 已关闭");
    }

    fn set_color(&mut self, color: Color) {
        if self.color != color {
            debug!("LED 颜色: {:?}", color);
        }
        self.color = color;
    }

    fn push_color(&mut self, color: Color) {
        debug!("LED 临时颜色: {:?}", color);
        self.stack.push(color);
    }

    fn pop_color(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    fn set_level(&mut self, level: FeedbackLevel) {
        debug!("LED 等级: {:?}", level);
        self.level = Some(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(secs: f64) -> FeedbackLevel {
        FeedbackLevel::Pulse(Duration::from_secs_f64(secs))
    }

    #[test]
    fn test_distance_thresholds() {
        let config = GameConfig::default();
        assert_eq!(FeedbackLevel::for_distance(15.1, false, &config), pulse(5.0));
        assert_eq!(FeedbackLevel::for_distance(15.0, false, &config), pulse(3.0));
        assert_eq!(FeedbackLevel::for_distance(11.25, false, &config), pulse(1.0));
        assert_eq!(FeedbackLevel::for_distance(6.0, false, &config), pulse(0.5));
        assert_eq!(FeedbackLevel::for_distance(2.0, false, &config), FeedbackLevel::Steady);
        assert_eq!(FeedbackLevel::for_distance(2.0, true, &config), FeedbackLevel::Arrived);
    }

    #[test]
    fn test_stale_reference_ladder() {
        assert_eq!(FeedbackLevel::for_stale_reference(30.0), pulse(5.0));
        assert_eq!(FeedbackLevel::for_stale_reference(25.0), pulse(3.0));
        assert_eq!(FeedbackLevel::for_stale_reference(10.0), pulse(1.0));
        assert_eq!(FeedbackLevel::for_stale_reference(8.0), FeedbackLevel::Arrived);
    }

    #[test]
    fn test_push_pop_color() {
        let mut led = SimulatedLed::new();
        led.set_color(Color::Green);
        led.push_color(Color::Purple);
        assert_eq!(led.color(), Color::Purple);
        assert!(led.pop_color());
        assert_eq!(led.color(), Color::Green);
        assert!(!led.pop_color());
    }

    #[test]
    fn test_failing_init() {
        let mut led = SimulatedLed::failing();
        assert!(matches!(led.initialize(), Err(HuntError::FeedbackInit(_))));
        assert!(!led.is_initialized());
    }
}
