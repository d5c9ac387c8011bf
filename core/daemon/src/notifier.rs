//! Desktop notifications for matching alerts.
//!
//! One notification per `alerts` write with non-empty content. There is no
//! notification id reuse and no suppression window.

use async_trait::async_trait;
use smn_alerts_core::AlertRecord;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

const NOTIFICATION_BODY: &str =
    "Hay alertas meteorológicas vigentes. Más información en https://www.smn.gob.ar/smn_alertas/alertas";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification command failed: {command}: {details}")]
    CommandFailed { command: String, details: String },
    #[error("desktop notifications are not supported on {0}")]
    UnsupportedPlatform(&'static str),
    #[error("failed to launch notification command: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, province: &str, alerts: &[AlertRecord]) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
}

pub fn build_notification(province: &str, icon: &str) -> Notification {
    Notification {
        title: format!("Existen alertas para {}", province),
        body: NOTIFICATION_BODY.to_string(),
        icon: icon.to_string(),
    }
}

/// Shows an OS notification through `notify-send` (Linux) or `osascript`
/// (macOS).
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    icon: String,
}

impl DesktopNotifier {
    pub fn new(icon: String) -> Self {
        Self { icon }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, province: &str, alerts: &[AlertRecord]) -> Result<(), NotifyError> {
        let notification = build_notification(province, &self.icon);
        let (program, args) = notification_command(&notification)?;

        let output = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(NotifyError::CommandFailed {
                command: program.to_string(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(province, count = alerts.len(), "Desktop notification shown");
        Ok(())
    }
}

fn notification_command(
    notification: &Notification,
) -> Result<(&'static str, Vec<String>), NotifyError> {
    match std::env::consts::OS {
        "linux" | "freebsd" | "openbsd" => Ok((
            "notify-send",
            vec![
                "--icon".to_string(),
                notification.icon.clone(),
                notification.title.clone(),
                notification.body.clone(),
            ],
        )),
        "macos" => Ok((
            "osascript",
            vec!["-e".to_string(), apple_script(notification)],
        )),
        other => Err(NotifyError::UnsupportedPlatform(other)),
    }
}

fn apple_script(notification: &Notification) -> String {
    format!(
        "display notification \"{}\" with title \"{}\"",
        escape_apple_string(&notification.body),
        escape_apple_string(&notification.title)
    )
}

fn escape_apple_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Writes notifications to the log instead of the desktop. Useful on headless
/// hosts.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    icon: String,
}

impl LogNotifier {
    pub fn new(icon: String) -> Self {
        Self { icon }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, province: &str, alerts: &[AlertRecord]) -> Result<(), NotifyError> {
        let notification = build_notification(province, &self.icon);
        let ids: Vec<&str> = alerts.iter().map(|alert| alert.id_alert.as_str()).collect();
        info!(
            title = %notification.title,
            body = %notification.body,
            alert_ids = ?ids,
            "Alert notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_names_the_province() {
        let notification = build_notification("Mendoza", "weather-icon.png");
        assert_eq!(notification.title, "Existen alertas para Mendoza");
        assert_eq!(notification.icon, "weather-icon.png");
        assert!(!notification.body.is_empty());
    }

    #[test]
    fn apple_script_escapes_quotes() {
        let notification = build_notification("Entre \"Ríos\"", "icon.png");
        let script = apple_script(&notification);
        assert!(script.contains("with title \"Existen alertas para Entre \\\"Ríos\\\"\""));
    }

    #[test]
    fn command_matches_platform() {
        let notification = build_notification("Salta", "icon.png");
        match std::env::consts::OS {
            "linux" => {
                let (program, args) = notification_command(&notification).unwrap();
                assert_eq!(program, "notify-send");
                assert_eq!(args[2], "Existen alertas para Salta");
            }
            "macos" => {
                let (program, _) = notification_command(&notification).unwrap();
                assert_eq!(program, "osascript");
            }
            _ => {}
        }
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notifier = LogNotifier::new("icon.png".to_string());
        let alerts = vec![AlertRecord::new("1", "Vigente", &[("a", "Salta")])];
        assert!(notifier.notify("Salta", &alerts).await.is_ok());
    }
}
