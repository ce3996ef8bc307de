//! Operator notifications.
//!
//! Every message is logged. When a Telegram bot is configured, messages are
//! also forwarded to the chat, at most one per throttle window. The first
//! message of a window goes out at once; the latest one refused inside the
//! window goes out when the window closes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// What to do with a message offered to a [`Throttle`].
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Deliver it now.
    Now(String),
    /// Held as the pending message. `Some` carries the instant a flush must
    /// be scheduled for; `None` means one is already scheduled.
    Held(Option<Instant>),
}

#[derive(Debug, Default)]
struct ThrottleState {
    last: Option<Instant>,
    pending: Option<String>,
    flush_scheduled: bool,
}

/// Leading and trailing throttle: the first message opens a window, later
/// messages inside the window replace one another as the pending message,
/// which is released once the window closes.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    pub fn admit(&self, message: String) -> Admission {
        let now = Instant::now();
        let mut state = self.state.lock();
        let open = state
            .last
            .map_or(true, |at| now.duration_since(at) >= self.window);

        if open && !state.flush_scheduled {
            state.last = Some(now);
            return Admission::Now(message);
        }

        state.pending = Some(message);
        if state.flush_scheduled {
            return Admission::Held(None);
        }
        state.flush_scheduled = true;
        let flush_at = state.last.map_or(now, |at| at + self.window);
        Admission::Held(Some(flush_at))
    }

    /// Release the pending message at the end of a window. Delivering it
    /// opens a new window.
    pub fn take_pending(&self) -> Option<String> {
        let mut state = self.state.lock();
        state.flush_scheduled = false;
        let message = state.pending.take()?;
        state.last = Some(Instant::now());
        Some(message)
    }
}

/// Remote channel that receives forwarded notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Failures are logged, never returned.
    async fn deliver(&self, message: &str);
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API `sendMessage`.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig, http_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .context("building Telegram HTTP client")?;
        Ok(Self {
            config,
            client,
            base_url: TELEGRAM_API.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn deliver(&self, message: &str) {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.config.bot_token);
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text: message,
        };
        let result = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            warn!(error = %e, "Error sending Telegram message");
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    sink: Option<Arc<dyn NotificationSink>>,
    throttle: Arc<Throttle>,
}

impl Notifier {
    /// Forward to Telegram when configured, otherwise log only.
    pub fn new(
        telegram: Option<TelegramConfig>,
        throttle_window: Duration,
        http_timeout: Duration,
    ) -> Result<Self> {
        let sink = match telegram {
            Some(config) => {
                Some(Arc::new(TelegramSink::new(config, http_timeout)?) as Arc<dyn NotificationSink>)
            }
            None => None,
        };
        Ok(Self {
            sink,
            throttle: Arc::new(Throttle::new(throttle_window)),
        })
    }

    pub fn with_sink(sink: Arc<dyn NotificationSink>, throttle_window: Duration) -> Self {
        Self {
            sink: Some(sink),
            throttle: Arc::new(Throttle::new(throttle_window)),
        }
    }

    /// Log-only notifier.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            throttle: Arc::new(Throttle::new(Duration::from_secs(40))),
        }
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Log `message` and forward it in the background, now or at the end of
    /// the current throttle window.
    ///
    /// Returns whether the message was handed to the remote channel right
    /// away. Never waits on the network.
    pub fn notify(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        info!(notification = %message, "Notify");

        let Some(sink) = self.sink.clone() else {
            return false;
        };

        match self.throttle.admit(message) {
            Admission::Now(message) => {
                tokio::spawn(async move { sink.deliver(&message).await });
                true
            }
            Admission::Held(Some(flush_at)) => {
                debug!("Notification throttled, delivering at window end");
                let throttle = Arc::clone(&self.throttle);
                tokio::spawn(async move {
                    tokio::time::sleep_until(flush_at).await;
                    if let Some(message) = throttle.take_pending() {
                        sink.deliver(&message).await;
                    }
                });
                false
            }
            Admission::Held(None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl RecordingSink {
        fn delivered(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_leading_and_trailing() {
        let throttle = Throttle::new(Duration::from_secs(40));
        let opened = Instant::now();

        assert_eq!(throttle.admit("a".into()), Admission::Now("a".into()));
        assert_eq!(
            throttle.admit("b".into()),
            Admission::Held(Some(opened + Duration::from_secs(40)))
        );
        assert_eq!(throttle.admit("c".into()), Admission::Held(None));

        // Still closed while a flush is pending, even past the window.
        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(throttle.admit("d".into()), Admission::Held(None));

        assert_eq!(throttle.take_pending(), Some("d".to_string()));
        assert_eq!(throttle.take_pending(), None);

        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(throttle.admit("e".into()), Admission::Now("e".into()));
    }

    #[tokio::test]
    async fn test_disabled_notifier_only_logs() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_remote_enabled());
        assert!(!notifier.notify("Found position to liquidate"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_throttled_message_delivered_at_window_end() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::with_sink(sink.clone(), Duration::from_secs(40));

        assert!(notifier.notify("first"));
        assert!(!notifier.notify("second"));
        assert!(!notifier.notify("third"));

        tokio::time::sleep(Duration::from_secs(39)).await;
        assert_eq!(sink.delivered(), vec!["first"]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.delivered(), vec!["first", "third"]);

        // The trailing delivery opened a new window at 40s.
        assert!(!notifier.notify("fourth"));
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(sink.delivered(), vec!["first", "third", "fourth"]);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(notifier.notify("fifth"));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(sink.delivered().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telegram_failures_are_only_logged() {
        let telegram = TelegramConfig {
            bot_token: "token".to_string(),
            chat_id: "chat".to_string(),
        };
        let sink = TelegramSink::new(telegram, Duration::from_millis(50))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let notifier = Notifier::with_sink(Arc::new(sink), Duration::from_secs(40));

        assert!(notifier.is_remote_enabled());
        assert!(notifier.notify("first"));
        assert!(!notifier.notify("second"));
    }
}
