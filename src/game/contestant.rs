/// 参赛者

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithms::{Point, VisibilityTracker};

/// 一次已确认的兴趣点访问
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub point_id: String,
    pub at: DateTime<Utc>,
}

/// 被跟踪的参赛者
#[derive(Clone, Debug, Default)]
pub struct Contestant {
    pub name: String,
    /// 当前测距参考点的位置
    pub position: Point,
    /// 回归估计的位置
    pub estimated_position: Point,
    /// 到参考点的估计半径
    pub current_radius: Option<f64>,
    visited: Vec<Visit>,
    tracker: VisibilityTracker,
    reference: Option<String>,
}

impl Contestant {
    pub fn new(name: impl Into<String>) -> Self {
        Contestant {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 登记本节拍看到的兴趣点
    pub fn register_current_points(&mut self, points: &[(String, f64)]) {
        self.tracker.register_current(points);
    }

    /// 平滑后的可见兴趣点，按距离升序
    pub fn visible_points(&self) -> Vec<(String, f64)> {
        self.tracker.visible_points()
    }

    pub fn tracker(&self) -> &VisibilityTracker {
        &self.tracker
    }

    /// 记录一次访问，已访问过的兴趣点返回 `false`
    pub fn visit(&mut self, point_id: &str, at: DateTime<Utc>) -> bool {
        if self.has_visited(point_id) {
            return false;
        }
        self.visited.push(Visit {
            point_id: point_id.to_string(),
            at,
        });
        true
    }

    pub fn has_visited(&self, point_id: &str) -> bool {
        self.visited.iter().any(|v| v.point_id.eq_ignore_ascii_case(point_id))
    }

    /// 按访问顺序排列的访问记录
    pub fn visited(&self) -> &[Visit] {
        &self.visited
    }

    /// 当前测距参考点
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub(crate) fn set_reference(&mut self, id: &str, position: Point, radius: Option<f64>) {
        self.reference = Some(id.to_string());
        self.position = position;
        self.current_radius = radius;
    }
}
