/// 配置：游戏参数与地图文件
///
/// 两者均为 TOML，缺省字段使用默认值。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::{Point, PointOfInterest};
use crate::error::{HuntError, Result};
use crate::game::{Bounds, Map};

/// 时间窗口的上限（秒），一年
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

/// 游戏参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// 最大可靠测距（米），同时决定 LED 等级阈值
    pub max_reliable_range_m: f64,
    /// 获胜所需的访问数
    pub visited_points_to_win: usize,
    /// 节拍周期（毫秒）
    pub loop_interval_ms: u64,
    /// 信标在此时间内出现过才视为在线（秒）
    pub live_beacon_period_secs: u64,
    /// 按钮按下后的有效期（秒）
    pub confirmation_window_secs: u64,
    /// 到达半径（米）
    pub arrival_radius_m: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            max_reliable_range_m: 15.0,
            visited_points_to_win: 10,
            loop_interval_ms: 200,
            live_beacon_period_secs: 30,
            confirmation_window_secs: 60,
            arrival_radius_m: 2.0,
        }
    }
}

impl GameConfig {
    /// 解析并校验参数
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 检查取值范围
    ///
    /// 距离必须为正的有限值，节拍与获胜访问数不能为 0，
    /// 时间窗口不超过 `MAX_WINDOW_SECS`，保证时间戳运算不会溢出。
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(HuntError::InvalidConfig(format!("{} 必须为正数，实际为 {}", name, value)))
            }
        };
        positive("max_reliable_range_m", self.max_reliable_range_m)?;
        positive("arrival_radius_m", self.arrival_radius_m)?;

        if self.loop_interval_ms == 0 {
            return Err(HuntError::InvalidConfig("loop_interval_ms 不能为 0".into()));
        }
        if self.visited_points_to_win == 0 {
            return Err(HuntError::InvalidConfig("visited_points_to_win 不能为 0".into()));
        }

        for (name, secs) in [
            ("live_beacon_period_secs", self.live_beacon_period_secs),
            ("confirmation_window_secs", self.confirmation_window_secs),
        ] {
            if secs > MAX_WINDOW_SECS {
                return Err(HuntError::InvalidConfig(format!(
                    "{} 超过上限 {}，实际为 {}",
                    name, MAX_WINDOW_SECS, secs
                )));
            }
        }
        Ok(())
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn live_beacon_period(&self) -> chrono::Duration {
        window(self.live_beacon_period_secs)
    }

    pub fn confirmation_window(&self) -> chrono::Duration {
        window(self.confirmation_window_secs)
    }
}

/// 未校验的超大取值截断到上限
fn window(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

/// 地图文件中的一个兴趣点
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointEntry {
    /// 对应信标的身份键
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub label: Option<String>,
}

/// 地图文件
///
/// ```toml
/// width = 40.0
/// height = 25.0
///
/// [[points]]
/// id = "EDD1EBEAC04E5DEFA017-0BDB87539B67"
/// x = 3.5
/// y = 12.0
/// label = "A"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapFile {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub points: Vec<PointEntry>,
}

impl MapFile {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 构建地图，未给出尺寸时取兴趣点的外包范围
    pub fn into_map(self) -> Result<Map> {
        if self.points.is_empty() {
            return Err(HuntError::EmptyMap);
        }

        let points: Vec<PointOfInterest> = self
            .points
            .into_iter()
            .map(|entry| {
                let poi = PointOfInterest::new(entry.id, Point::new(entry.x, entry.y));
                match entry.label {
                    Some(label) => poi.with_label(label),
                    None => poi,
                }
            })
            .collect();

        let mut map = Map::new(points);
        let derived = map.bounds;
        map.bounds = Bounds {
            width: self.width.unwrap_or(derived.width),
            height: self.height.unwrap_or(derived.height),
        };
        Ok(map)
    }
}
