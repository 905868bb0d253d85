/// 引导状态机的单节拍逻辑
///
/// 每个节拍：测距 → 可见性平滑 → 选参考点 → 计算到目标的距离 →
/// 输出 LED 颜色与等级 → 检查到达确认。
/// 不涉及计时与并发，由 `GameService` 按固定周期驱动。

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::algorithms::{estimate_distance, Color, Point, PointOfInterest};
use crate::beacon::BeaconSighting;
use crate::config::GameConfig;
use crate::error::{HuntError, Result};

use super::{FeedbackLevel, Map, Visit};

/// 单个信标的测距结果，距离未知时为 `None`
#[derive(Clone, Debug, PartialEq)]
pub struct BeaconRange {
    pub key: String,
    pub distance: Option<f64>,
}

impl BeaconRange {
    pub fn new(key: impl Into<String>, distance: Option<f64>) -> Self {
        BeaconRange {
            key: key.into(),
            distance,
        }
    }

    /// 由信标目击记录测距
    pub fn from_sighting(sighting: &BeaconSighting) -> Self {
        BeaconRange {
            key: sighting.identity_key(),
            distance: estimate_distance(sighting.calibrated_power, sighting.signal_strength),
        }
    }
}

/// 渲染用的地图快照
#[derive(Clone, Debug, Serialize)]
pub struct MapSnapshot {
    pub at: DateTime<Utc>,
    pub points: Vec<PointOfInterest>,
    pub goal: Option<String>,
    pub reference: Option<String>,
    pub contestant_position: Point,
    pub estimated_position: Point,
    pub current_radius: Option<f64>,
    pub distance_to_goal: Option<f64>,
    pub visited: Vec<Visit>,
}

/// 输出给渲染端的事件
#[derive(Clone, Debug, Serialize)]
pub enum GameEvent {
    Update(MapSnapshot),
    GoalReached {
        visit: Visit,
        next_goal: Option<String>,
    },
    Completed {
        visited: Vec<Visit>,
    },
}

/// 单节拍的结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    /// 需要设置的 LED 颜色
    pub led_color: Option<Color>,
    /// 需要设置的 LED 等级
    pub level: Option<FeedbackLevel>,
    pub distance_to_goal: Option<f64>,
    /// 本节拍确认到达的目标
    pub reached: Option<Visit>,
    /// 到达后新选出的目标
    pub next_goal: Option<String>,
    /// 游戏结束
    pub completed: bool,
}

/// 游戏状态：地图、参赛者和目标选择
#[derive(Debug)]
pub struct GameState {
    config: GameConfig,
    map: Map,
    rng: StdRng,
    last_distance: Option<f64>,
}

impl GameState {
    pub fn new(map: Map, config: GameConfig) -> Result<Self> {
        Self::with_rng(map, config, StdRng::from_entropy())
    }

    /// 固定随机种子，目标选择可复现
    pub fn with_seed(map: Map, config: GameConfig, seed: u64) -> Result<Self> {
        Self::with_rng(map, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(map: Map, config: GameConfig, rng: StdRng) -> Result<Self> {
        if map.points().is_empty() {
            return Err(HuntError::EmptyMap);
        }
        Ok(GameState {
            config,
            map,
            rng,
            last_distance: None,
        })
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// 随机选择初始目标
    pub fn choose_initial_goal(&mut self) -> Result<String> {
        let id = self
            .map
            .points()
            .choose(&mut self.rng)
            .map(|p| p.id().to_string())
            .ok_or(HuntError::EmptyMap)?;
        self.map.set_goal(&id)?;
        info!("初始目标: {}", id);
        Ok(id)
    }

    /// 随机选择一个未访问的兴趣点作为下一个目标
    ///
    /// 达到获胜访问数或没有未访问的兴趣点时返回 `None`。
    fn assign_next_goal(&mut self) -> Result<Option<String>> {
        let contestant = &self.map.contestant;
        if contestant.visited().len() >= self.config.visited_points_to_win {
            return Ok(None);
        }

        let candidates: Vec<&PointOfInterest> = self
            .map
            .points()
            .iter()
            .filter(|p| !contestant.has_visited(p.id()))
            .collect();
        let Some(next) = candidates.choose(&mut self.rng).map(|p| p.id().to_string()) else {
            return Ok(None);
        };

        self.map.set_goal(&next)?;
        Ok(Some(next))
    }

    /// 用登记表中的目击记录推进一个节拍
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        sightings: &[BeaconSighting],
        last_press: Option<DateTime<Utc>>,
    ) -> Result<TickOutcome> {
        let ranges: Vec<BeaconRange> = sightings.iter().map(BeaconRange::from_sighting).collect();
        self.tick_with_ranges(now, &ranges, last_press)
    }

    /// 用已测距的信标推进一个节拍
    pub fn tick_with_ranges(
        &mut self,
        now: DateTime<Utc>,
        ranges: &[BeaconRange],
        last_press: Option<DateTime<Utc>>,
    ) -> Result<TickOutcome> {
        let goal_id = self.map.goal_id().ok_or(HuntError::NoGoal)?.to_string();
        let max_range = self.config.max_reliable_range_m;

        let known: Vec<(String, f64)> = ranges
            .iter()
            .filter_map(|r| r.distance.map(|d| (r.key.clone(), d)))
            .collect();
        self.map.contestant.register_current_points(&known);
        let visible = self.map.contestant.visible_points();

        let estimated = self.map.estimate_position(&visible);
        self.map.contestant.estimated_position = estimated;

        let reliable: Vec<&(String, f64)> = known.iter().filter(|(_, d)| *d <= max_range).collect();
        let is_reliable =
            |poi: &PointOfInterest| reliable.iter().any(|(key, _)| poi.matches(key));

        let goal = self
            .map
            .point(&goal_id)
            .ok_or_else(|| HuntError::UnknownPoint(goal_id.clone()))?;
        let reference = if is_reliable(goal) {
            Some(goal.id().to_string())
        } else {
            self.map
                .points()
                .iter()
                .filter(|p| !p.matches(&goal_id) && is_reliable(*p))
                .min_by(|a, b| a.distance_to(goal).total_cmp(&b.distance_to(goal)))
                .map(|p| p.id().to_string())
        };

        let mut outcome = TickOutcome::default();

        match reference {
            Some(ref_id) => {
                let at_goal = ref_id.eq_ignore_ascii_case(&goal_id);
                let radius = radius_of(&visible, &ref_id)
                    .or_else(|| radius_of(&known, &ref_id))
                    .ok_or_else(|| HuntError::UnknownPoint(ref_id.clone()))?;
                let distance_to_goal = if at_goal {
                    radius
                } else {
                    let map_distance = self
                        .map
                        .distance_between(&ref_id, &goal_id)
                        .ok_or_else(|| HuntError::UnknownPoint(ref_id.clone()))?;
                    radius + map_distance
                };

                self.recolor(&visible, &ref_id, &goal_id, Some(radius));
                let position = self.reference_position(&ref_id)?;
                self.map.contestant.set_reference(&ref_id, position, Some(radius));

                outcome.led_color = Some(if at_goal { Color::Green } else { Color::Blue });
                outcome.level = Some(FeedbackLevel::for_distance(
                    distance_to_goal,
                    at_goal,
                    &self.config,
                ));
                outcome.distance_to_goal = Some(distance_to_goal);
                debug!(
                    "参考点 {}，半径 {:.2}m，到目标 {:.2}m",
                    ref_id, radius, distance_to_goal
                );
            }
            None => {
                if let Some(prev) = self.map.contestant.reference().map(str::to_string) {
                    let map_distance = self
                        .map
                        .distance_between(&prev, &goal_id)
                        .ok_or_else(|| HuntError::UnknownPoint(prev.clone()))?;
                    let radius = radius_of(&visible, &prev);
                    self.recolor(&visible, &prev, &goal_id, radius);
                    outcome.level = Some(FeedbackLevel::for_stale_reference(map_distance));
                    debug!("无可靠信标，沿用参考点 {}，地图距离 {:.2}m", prev, map_distance);
                }
            }
        }
        self.last_distance = outcome.distance_to_goal;

        self.check_arrival(now, &goal_id, last_press, &mut outcome)?;
        Ok(outcome)
    }

    fn check_arrival(
        &mut self,
        now: DateTime<Utc>,
        goal_id: &str,
        last_press: Option<DateTime<Utc>>,
        outcome: &mut TickOutcome,
    ) -> Result<()> {
        let goal_radius = self.map.point(goal_id).and_then(|p| p.estimated_radius);
        let close_enough = goal_radius.is_some_and(|r| r <= self.config.arrival_radius_m);
        let confirmed =
            last_press.is_some_and(|at| now - at < self.config.confirmation_window());
        if !(close_enough && confirmed) {
            return Ok(());
        }

        if !self.map.contestant.visit(goal_id, now) {
            return Ok(());
        }
        let visit = Visit {
            point_id: goal_id.to_string(),
            at: now,
        };
        info!("到达目标 {}，已访问 {} 个", goal_id, self.map.contestant.visited().len());

        let next = self.assign_next_goal()?;
        match &next {
            Some(id) => info!("下一个目标: {}", id),
            None => {
                info!("寻宝完成，共访问 {} 个兴趣点", self.map.contestant.visited().len());
                outcome.completed = true;
            }
        }
        outcome.reached = Some(visit);
        outcome.next_goal = next;
        Ok(())
    }

    /// 可见的兴趣点标紫色，不可见的标蓝色，参考点标绿色（目标）或橙色；
    /// 只有参考点保留估计半径。
    fn recolor(&mut self, visible: &[(String, f64)], ref_id: &str, goal_id: &str, radius: Option<f64>) {
        for poi in self.map.points_mut() {
            let seen = visible.iter().any(|(id, _)| poi.matches(id));
            let is_reference = poi.matches(ref_id);
            poi.estimated_radius = if is_reference { radius } else { None };
            poi.color = match (is_reference, seen) {
                (true, _) if poi.matches(goal_id) => Color::Green,
                (true, _) => Color::Orange,
                (false, true) => Color::Purple,
                (false, false) => Color::Blue,
            };
        }
    }

    fn reference_position(&self, ref_id: &str) -> Result<Point> {
        self.map
            .point(ref_id)
            .map(|p| p.position)
            .ok_or_else(|| HuntError::UnknownPoint(ref_id.to_string()))
    }

    pub fn snapshot(&self, at: DateTime<Utc>) -> MapSnapshot {
        let contestant = &self.map.contestant;
        MapSnapshot {
            at,
            points: self.map.points().to_vec(),
            goal: self.map.goal_id().map(str::to_string),
            reference: contestant.reference().map(str::to_string),
            contestant_position: contestant.position,
            estimated_position: contestant.estimated_position,
            current_radius: contestant.current_radius,
            distance_to_goal: self.last_distance,
            visited: contestant.visited().to_vec(),
        }
    }
}

fn radius_of(ranges: &[(String, f64)], id: &str) -> Option<f64> {
    ranges
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(id))
        .map(|(_, d)| *d)
}
