//! Display formatting for terminal output and notifications
//!
//! Provides human-readable sizes and ages, plus the artifact table printed
//! by `snapkeep list`.

use chrono::{DateTime, Utc};

use crate::backup::inventory::Inventory;
use crate::backup::retention::RetentionPlan;

/// Format a byte count with binary units, e.g. `1.0 KiB`
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;

    if bytes >= TIB {
        format!("{:.1} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format an age in the largest sensible unit
pub fn format_age(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Format the artifact directory with the retention verdict for each entry
pub fn format_artifact_list(
    inventory: &Inventory,
    plan: &RetentionPlan,
    now: DateTime<Utc>,
) -> String {
    if inventory.artifacts.is_empty() {
        return "No backups found.".to_string();
    }

    let name_width = inventory
        .artifacts
        .iter()
        .map(|a| a.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:>10}  {:>6}  {}\n",
        "Name",
        "Size",
        "Age",
        "Retention",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:->10}  {:->6}  {:-<9}\n",
        "",
        "",
        "",
        "",
        name_width = name_width,
    ));

    for artifact in &inventory.artifacts {
        let verdict = match plan.reason_for(&artifact.name) {
            Some(reason) => format!("keep ({})", reason),
            None => "prune".to_string(),
        };

        output.push_str(&format!(
            "{:<name_width$}  {:>10}  {:>6}  {}\n",
            artifact.name,
            format_size(artifact.size_bytes),
            format_age(now.signed_duration_since(artifact.created_at)),
            verdict,
            name_width = name_width,
        ));
    }

    output.push_str(&format!(
        "\n{} backup(s), {} total, {} to prune\n",
        inventory.artifacts.len(),
        format_size(inventory.total_bytes()),
        plan.prune.len()
    ));

    if let Some(latest) = inventory.latest() {
        output.push_str(&format!(
            "Latest: {} ({} ago)\n",
            latest.name,
            format_age(now.signed_duration_since(latest.created_at))
        ));
    }

    if !inventory.foreign.is_empty() {
        output.push_str(&format!(
            "{} unrecognised file(s) ignored\n",
            inventory.foreign.len()
        ));
    }

    output
}
