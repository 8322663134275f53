//! Daily contribution reminder
//!
//! Polls the local clock and shows a desktop notification when it reaches the
//! configured `HH:MM`.

pub mod notify;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};

pub use notify::{DesktopNotifier, Notifier};

use crate::Result;
use crate::config::ReminderConfig;

/// How often the clock is checked
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Pause after firing, so a reminder fires once per matching minute
pub const COOLDOWN: Duration = Duration::from_secs(60);

/// Reminder service
pub struct Reminder {
    settings: ReminderConfig,
    notifier: Arc<dyn Notifier>,
}

impl Reminder {
    /// Create a reminder with the given settings and notifier
    #[must_use]
    pub fn new(settings: ReminderConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self { settings, notifier }
    }

    /// Whether the reminder is due at `now`
    #[must_use]
    pub fn is_due(&self, now: NaiveTime) -> bool {
        now.format("%H:%M").to_string() == self.settings.time
    }

    /// Announce the reminder on stdout and as a notification
    ///
    /// # Errors
    ///
    /// Returns error if the notification could not be shown
    pub async fn fire(&self) -> Result<()> {
        tracing::info!(time = %self.settings.time, "triggering reminder");
        println!(
            "Reminder: It's {} - {}",
            self.settings.time, self.settings.message
        );
        self.send().await
    }

    /// Show the configured notification once
    ///
    /// # Errors
    ///
    /// Returns error if the notification could not be shown
    pub async fn send(&self) -> Result<()> {
        self.notifier
            .notify(&self.settings.title, &self.settings.message)
            .await
    }

    /// Check the clock once and return how long to wait before the next check
    ///
    /// A failed notification is reported and does not stop the reminder.
    pub async fn tick(&self, now: NaiveTime) -> Duration {
        if !self.is_due(now) {
            return POLL_INTERVAL;
        }

        if let Err(e) = self.fire().await {
            tracing::error!(error = %e, "failed to send reminder notification");
            println!("Failed to send notification: {e}");
        }
        COOLDOWN
    }

    /// Run until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(time = %self.settings.time, "reminder service started");
        tokio::pin!(shutdown);

        loop {
            let wait = self.tick(Local::now().time()).await;

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("reminder service stopped");
                    break;
                }
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}

impl std::fmt::Debug for Reminder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reminder")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::Error;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, title: &str, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            if self.fail {
                return Err(Error::Notification("no display".to_string()));
            }
            Ok(())
        }
    }

    fn reminder_at(time: &str, notifier: Arc<RecordingNotifier>) -> Reminder {
        let settings = ReminderConfig {
            time: time.to_string(),
            ..ReminderConfig::default()
        };
        Reminder::new(settings, notifier)
    }

    fn at(hour: u32, minute: u32, second: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, second).unwrap()
    }

    #[test]
    fn due_for_the_whole_minute() {
        let reminder = reminder_at("17:00", Arc::default());
        assert!(reminder.is_due(at(17, 0, 0)));
        assert!(reminder.is_due(at(17, 0, 59)));
        assert!(!reminder.is_due(at(16, 59, 59)));
        assert!(!reminder.is_due(at(17, 1, 0)));
    }

    #[tokio::test]
    async fn tick_fires_when_due() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reminder = reminder_at("09:30", Arc::clone(&notifier));

        assert_eq!(reminder.tick(at(9, 29, 50)).await, POLL_INTERVAL);
        assert!(notifier.sent.lock().unwrap().is_empty());

        assert_eq!(reminder.tick(at(9, 30, 0)).await, COOLDOWN);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(
                "Contribution Reminder".to_string(),
                "Don't forget to log your contributions!".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn failed_notification_keeps_running() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let reminder = reminder_at("09:30", Arc::clone(&notifier));

        assert_eq!(reminder.tick(at(9, 30, 10)).await, COOLDOWN);
        assert!(reminder.send().await.is_err());
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let reminder = reminder_at("00:00", Arc::default());
        tokio::time::timeout(Duration::from_secs(5), reminder.run_until(async {}))
            .await
            .unwrap();
    }
}
