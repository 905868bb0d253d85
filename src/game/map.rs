/// 地图：兴趣点、参赛者与当前目标

use serde::{Deserialize, Serialize};

use crate::algorithms::{estimate_position, Point, PointOfInterest};
use crate::error::{HuntError, Result};

use super::Contestant;

/// 地图尺寸（米）
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug)]
pub struct Map {
    points: Vec<PointOfInterest>,
    pub contestant: Contestant,
    goal: Option<String>,
    pub bounds: Bounds,
}

impl Map {
    /// 由兴趣点创建地图，尺寸取兴趣点的外包范围
    pub fn new(points: Vec<PointOfInterest>) -> Self {
        let bounds = Bounds {
            width: points.iter().map(|p| p.position.x).fold(0.0, f64::max),
            height: points.iter().map(|p| p.position.y).fold(0.0, f64::max),
        };
        Map {
            points,
            contestant: Contestant::new("contestant"),
            goal: None,
            bounds,
        }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [PointOfInterest] {
        &mut self.points
    }

    /// 按 ID 查找兴趣点（不区分大小写）
    pub fn point(&self, id: &str) -> Option<&PointOfInterest> {
        self.points.iter().find(|p| p.matches(id))
    }

    pub fn point_mut(&mut self, id: &str) -> Option<&mut PointOfInterest> {
        self.points.iter_mut().find(|p| p.matches(id))
    }

    /// 当前目标
    pub fn goal(&self) -> Option<&PointOfInterest> {
        self.goal.as_deref().and_then(|id| self.point(id))
    }

    pub fn goal_id(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    /// 设置当前目标，ID 必须在地图上
    pub fn set_goal(&mut self, id: &str) -> Result<()> {
        let point = self
            .point(id)
            .ok_or_else(|| HuntError::UnknownPoint(id.to_string()))?;
        self.goal = Some(point.id().to_string());
        Ok(())
    }

    /// 两个兴趣点之间的地图距离
    pub fn distance_between(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.point(a)?.distance_to(self.point(b)?))
    }

    /// 根据可见兴趣点估计参赛者位置
    ///
    /// 匹配到的兴趣点会记下本次的估计半径。匹配不足 2 个时返回原点。
    pub fn estimate_position(&mut self, visible: &[(String, f64)]) -> Point {
        let matched: Vec<(usize, f64)> = self
            .points
            .iter()
            .enumerate()
            .filter_map(|(idx, poi)| {
                visible
                    .iter()
                    .find(|(id, _)| poi.matches(id))
                    .map(|(_, d)| (idx, *d))
            })
            .collect();

        if matched.len() < 2 {
            return Point::ORIGIN;
        }

        for &(idx, radius) in &matched {
            self.points[idx].estimated_radius = Some(radius);
        }

        let samples: Vec<(Point, f64)> = matched
            .iter()
            .map(|&(idx, radius)| (self.points[idx].position, radius))
            .collect();
        estimate_position(&samples)
    }
}
