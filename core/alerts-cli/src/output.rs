//! Human-readable rendering of daemon snapshots.

use chrono::{DateTime, Local};
use smn_alerts_core::{AlertRecord, StoreSnapshot};

const MORE_INFO_URL: &str = "https://www.smn.gob.ar/smn_alertas/alertas";

pub fn format_summary(snapshot: &StoreSnapshot) -> String {
    let mut lines = vec![
        format!("Activo: {}", if snapshot.active { "sí" } else { "no" }),
        format!("Intervalo: {}", format_delay(snapshot.delay)),
        format!(
            "Provincia: {}",
            snapshot
                .selected_province
                .as_deref()
                .unwrap_or("(sin seleccionar)")
        ),
    ];

    match snapshot.selected_province.as_deref() {
        Some(province) if !snapshot.alerts.is_empty() => {
            lines.push(format!(
                "Existen {} alertas para {}.",
                snapshot.alerts.len(),
                province
            ));
            lines.extend(snapshot.alerts.iter().map(format_alert));
            lines.push(format!("Para mayor información: {}", MORE_INFO_URL));
        }
        Some(_) => lines.push("Sin alertas vigentes.".to_string()),
        None => {}
    }

    lines.join("\n")
}

/// Summary followed by the local time it was received.
pub fn format_update(snapshot: &StoreSnapshot, received_at: DateTime<Local>) -> String {
    format!(
        "{}\nÚltima actualización: {}.",
        format_summary(snapshot),
        received_at.format("%d/%m/%Y %H:%M:%S")
    )
}

fn format_alert(alert: &AlertRecord) -> String {
    let title = alert
        .extra
        .get("title")
        .and_then(|value| value.as_str())
        .unwrap_or("Alerta");
    format!(
        "  - [{}] {} ({}): {}",
        alert.id_alert,
        title,
        alert.status,
        alert.zone_text()
    )
}

pub fn format_delay(delay_ms: u64) -> String {
    let seconds = delay_ms / 1000;
    if seconds % 60 == 0 {
        format!("{} min", seconds / 60)
    } else {
        format!("{} s", seconds)
    }
}
