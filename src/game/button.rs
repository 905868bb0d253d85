/// 到达确认按钮

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{HuntError, Result};

/// 确认信号来源
pub trait ConfirmationButton: Send {
    fn initialize(&mut self) -> Result<()>;
    fn shutdown(&mut self);
    /// 最近一次按下的时间
    fn last_press(&self) -> Option<DateTime<Utc>>;
    fn clear_press(&mut self);
}

#[derive(Debug, Default)]
struct ButtonInner {
    last_press: Mutex<Option<DateTime<Utc>>>,
    initialized: AtomicBool,
    fail_on_init: bool,
}

/// 模拟按钮
///
/// 克隆得到的句柄共享同一状态，任意线程都可以调用 `press`。
#[derive(Clone, Debug, Default)]
pub struct SimulatedButton {
    inner: Arc<ButtonInner>,
}

impl SimulatedButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初始化必定失败的按钮
    pub fn failing() -> Self {
        SimulatedButton {
            inner: Arc::new(ButtonInner {
                fail_on_init: true,
                ..ButtonInner::default()
            }),
        }
    }

    pub fn press(&self) {
        self.press_at(Utc::now());
    }

    pub fn press_at(&self, at: DateTime<Utc>) {
        debug!("按钮按下: {}", at);
        *self.slot() = Some(at);
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.inner
            .last_press
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfirmationButton for SimulatedButton {
    fn initialize(&mut self) -> Result<()> {
        if self.inner.fail_on_init {
            return Err(HuntError::ButtonInit("模拟按钮不可用".to_string()));
        }
        self.inner.initialized.store(true, Ordering::SeqCst);
        info!("模拟按钮已初始化");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.inner.initialized.store(false, Ordering::SeqCst);
        info!("模拟按钮已关闭");
    }

    fn last_press(&self) -> Option<DateTime<Utc>> {
        *self.slot()
    }

    fn clear_press(&mut self) {
        *self.slot() = None;
    }
}
