/// 兴趣点定义和相关数据结构

use serde::{Deserialize, Serialize};

/// 平面坐标（米）
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// 欧几里得距离
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 显示颜色
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    Black,
    Red,
    Green,
    #[default]
    Blue,
    Purple,
    Orange,
}

/// 地图上固定的信标位置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// 信标身份键，放上地图后不可变
    id: String,
    /// 友好名称
    pub label: Option<String>,
    pub position: Point,
    /// 本节拍的估计半径（米）
    pub estimated_radius: Option<f64>,
    pub color: Color,
}

impl PointOfInterest {
    pub fn new(id: impl Into<String>, position: Point) -> Self {
        PointOfInterest {
            id: id.into(),
            label: None,
            position,
            estimated_radius: None,
            color: Color::Blue,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 身份键比较（不区分大小写）
    pub fn matches(&self, key: &str) -> bool {
        self.id.eq_ignore_ascii_case(key)
    }

    /// 与另一兴趣点的地图距离
    pub fn distance_to(&self, other: &PointOfInterest) -> f64 {
        self.position.distance_to(&other.position)
    }
}
