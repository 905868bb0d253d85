/// 游戏服务：以固定节拍驱动 `GameState`
///
/// 状态流转：Idle → Running ⇄ Paused → Stopped。
/// 循环在独立的 tokio 任务中运行，停止信号通过 watch 通道传递，
/// 节拍间的等待与停止信号竞争，保证停止及时生效。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::algorithms::Color;
use crate::beacon::BeaconRegistry;
use crate::config::GameConfig;
use crate::error::{HuntError, Result};

use super::{ConfirmationButton, FeedbackLevel, FeedbackSink, GameEvent, GameState, Map};

/// 游戏服务的生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GamePhase {
    Idle,
    Running,
    Paused,
    Stopped,
}

pub struct GameService<L, B> {
    config: GameConfig,
    registry: Arc<BeaconRegistry>,
    led: Arc<Mutex<L>>,
    button: Arc<Mutex<B>>,
    paused: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<GameEvent>,
    phase: GamePhase,
    seed: Option<u64>,
    cancel: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl<L, B> GameService<L, B>
where
    L: FeedbackSink + 'static,
    B: ConfirmationButton + 'static,
{
    /// 创建服务，同时返回事件接收端
    pub fn new(
        config: GameConfig,
        registry: Arc<BeaconRegistry>,
        led: L,
        button: B,
    ) -> (Self, mpsc::UnboundedReceiver<GameEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let service = GameService {
            config,
            registry,
            led: Arc::new(Mutex::new(led)),
            button: Arc::new(Mutex::new(button)),
            paused: Arc::new(AtomicBool::new(false)),
            events,
            phase: GamePhase::Idle,
            seed: None,
            cancel: None,
            worker: None,
        };
        (service, rx)
    }

    /// 固定目标选择的随机种子
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn state(&self) -> GamePhase {
        self.phase
    }

    /// 共享的 LED
    pub fn led(&self) -> Arc<Mutex<L>> {
        Arc::clone(&self.led)
    }

    /// 游戏循环是否已经自行结束（寻宝完成）
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// 开始游戏
    ///
    /// 只能在 Idle 状态调用。参数无效、反馈设备或按钮初始化失败、选不出目标时返回错误，
    /// 循环不会启动，已初始化的设备会被关闭。
    pub async fn start(&mut self, map: Map) -> Result<()> {
        if self.phase != GamePhase::Idle {
            return Err(HuntError::invalid_state(self.phase, "start"));
        }
        self.config.validate()?;

        let mut state = match self.seed {
            Some(seed) => GameState::with_seed(map, self.config.clone(), seed)?,
            None => GameState::new(map, self.config.clone())?,
        };

        // 设备初始化前确定目标，之后的失败只剩设备本身
        let goal = state.choose_initial_goal()?;

        self.led.lock().await.initialize()?;
        if let Err(e) = self.button.lock().await.initialize() {
            self.shutdown_devices().await;
            return Err(e);
        }

        self.led.lock().await.set_color(Color::Blue);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let game_loop = GameLoop {
            state,
            registry: Arc::clone(&self.registry),
            led: Arc::clone(&self.led),
            button: Arc::clone(&self.button),
            paused: Arc::clone(&self.paused),
            events: self.events.clone(),
            cancel: cancel_rx,
            interval: self.config.loop_interval(),
            live_period: self.config.live_beacon_period(),
            last_level: None,
        };

        self.worker = Some(tokio::spawn(game_loop.run()));
        self.cancel = Some(cancel_tx);
        self.phase = GamePhase::Running;
        info!("游戏开始，目标 {}", goal);
        Ok(())
    }

    /// 暂停：LED 临时显示紫色，循环继续运行但跳过节拍逻辑
    pub async fn pause(&mut self) -> Result<()> {
        if self.phase != GamePhase::Running {
            return Err(HuntError::invalid_state(self.phase, "pause"));
        }
        self.paused.store(true, Ordering::SeqCst);
        self.led.lock().await.push_color(Color::Purple);
        self.phase = GamePhase::Paused;
        info!("游戏暂停");
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<()> {
        if self.phase != GamePhase::Paused {
            return Err(HuntError::invalid_state(self.phase, "resume"));
        }
        self.led.lock().await.pop_color();
        self.paused.store(false, Ordering::SeqCst);
        self.phase = GamePhase::Running;
        info!("游戏继续");
        Ok(())
    }

    /// 停止游戏并等待循环退出
    ///
    /// 重复调用直接返回成功。循环任务异常退出时返回 `HuntError::Stop`。
    pub async fn stop(&mut self) -> Result<()> {
        if self.phase == GamePhase::Stopped {
            return Ok(());
        }
        self.phase = GamePhase::Stopped;

        if let Some(cancel) = self.cancel.take() {
            // 循环已自行结束时接收端已关闭
            let _ = cancel.send(true);
        }

        self.shutdown_devices().await;

        if let Some(worker) = self.worker.take() {
            worker.await.map_err(|e| HuntError::Stop(e.to_string()))?;
        }
        info!("游戏已停止");
        Ok(())
    }

    async fn shutdown_devices(&self) {
        self.led.lock().await.shutdown();
        self.button.lock().await.shutdown();
    }
}

/// 在后台任务中运行的游戏循环
struct GameLoop<L, B> {
    state: GameState,
    registry: Arc<BeaconRegistry>,
    led: Arc<Mutex<L>>,
    button: Arc<Mutex<B>>,
    paused: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<GameEvent>,
    cancel: watch::Receiver<bool>,
    interval: Duration,
    live_period: chrono::Duration,
    last_level: Option<FeedbackLevel>,
}

impl<L, B> GameLoop<L, B>
where
    L: FeedbackSink,
    B: ConfirmationButton,
{
    async fn run(mut self) {
        debug!("游戏循环启动，节拍 {:?}", self.interval);

        loop {
            if self.cancelled() {
                break;
            }
            let started = Instant::now();

            let finished = self.tick().await;
            if finished || self.cancelled() {
                break;
            }

            // 扣除本节拍耗时，避免节拍漂移
            let remaining = self.interval.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        // 控制端已被丢弃
                        break;
                    }
                }
            }
        }

        debug!("游戏循环退出");
    }

    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// 执行一个节拍，游戏结束时返回 `true`
    async fn tick(&mut self) -> bool {
        if self.paused.load(Ordering::SeqCst) {
            return false;
        }

        let now = Utc::now();
        let cutoff = match now.checked_sub_signed(self.live_period) {
            Some(cutoff) => cutoff,
            None => {
                warn!("在线时间窗口 {} 超出范围，视所有信标为在线", self.live_period);
                DateTime::<Utc>::MIN_UTC
            }
        };
        let sightings = self.registry.visible_since(cutoff);
        let last_press = self.button.lock().await.last_press();

        let outcome = match self.state.tick(now, &sightings, last_press) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("节拍处理失败: {}", e);
                return false;
            }
        };

        {
            let mut led = self.led.lock().await;
            if let Some(color) = outcome.led_color {
                led.set_color(color);
            }
            if let Some(level) = outcome.level {
                if self.last_level != Some(level) {
                    led.set_level(level);
                    self.last_level = Some(level);
                }
            }
        }

        // 接收端被丢弃时事件直接丢弃
        let _ = self.events.send(GameEvent::Update(self.state.snapshot(now)));

        if let Some(visit) = outcome.reached {
            self.button.lock().await.clear_press();
            let _ = self.events.send(GameEvent::GoalReached {
                visit,
                next_goal: outcome.next_goal,
            });
        }

        if outcome.completed {
            let visited = self.state.map().contestant.visited().to_vec();
            info!("寻宝完成，访问 {} 个兴趣点", visited.len());
            let _ = self.events.send(GameEvent::Completed { visited });
            return true;
        }

        false
    }
}
