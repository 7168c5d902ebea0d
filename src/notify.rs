use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{ChannelId, Http};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

impl FromStr for NotifyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(NotifyLevel::Info),
            "warn" | "warning" => Ok(NotifyLevel::Warn),
            "error" => Ok(NotifyLevel::Error),
            other => Err(format!("unknown notify level '{other}'")),
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Warn => "warn",
            NotifyLevel::Error => "error",
        })
    }
}

/// Operator-facing notifications. Implementations must not fail loudly.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, level: NotifyLevel, message: &str);
}

/// Writes notifications to the log only.
#[derive(Default)]
pub struct LogNotifier;

fn log(level: NotifyLevel, message: &str) {
    match level {
        NotifyLevel::Info => info!("{}", message),
        NotifyLevel::Warn => warn!("{}", message),
        NotifyLevel::Error => error!("{}", message),
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, level: NotifyLevel, message: &str) {
        log(level, message);
    }
}

/// Logs, and posts to a Discord channel at or above `min_level`.
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
    min_level: NotifyLevel,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: u64, min_level: NotifyLevel) -> Self {
        Self {
            http,
            channel_id: ChannelId::new(channel_id),
            min_level,
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, level: NotifyLevel, message: &str) {
        log(level, message);
        if level < self.min_level {
            return;
        }
        let content = format!("**[{}]** {}", level, message);
        if let Err(e) = self.channel_id.say(&*self.http, content).await {
            warn!("Failed to post notification to channel {}: {}", self.channel_id, e);
        }
    }
}

/// Forwards to whichever notifier is installed; starts as [`LogNotifier`].
/// The channel notifier needs an HTTP client, which exists only once the
/// gateway client is built.
pub struct NotifierHandle {
    inner: parking_lot::RwLock<Arc<dyn Notifier>>,
}

impl Default for NotifierHandle {
    fn default() -> Self {
        Self {
            inner: parking_lot::RwLock::new(Arc::new(LogNotifier)),
        }
    }
}

impl NotifierHandle {
    pub fn install(&self, notifier: Arc<dyn Notifier>) {
        *self.inner.write() = notifier;
    }
}

#[async_trait]
impl Notifier for NotifierHandle {
    async fn notify(&self, level: NotifyLevel, message: &str) {
        let notifier = self.inner.read().clone();
        notifier.notify(level, message).await;
    }
}
