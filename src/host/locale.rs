use chrono::DateTime;

use super::Localizer;

/// English strings and UTC dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn local_update_label(&self) -> String {
        "Local update".to_string()
    }

    fn format_build_date(&self, epoch_millis: i64) -> String {
        match DateTime::from_timestamp_millis(epoch_millis) {
            Some(date) => date.format("%b %-d, %Y").to_string(),
            None => epoch_millis.to_string(),
        }
    }

    fn import_failure_notice(&self) -> String {
        "Failed to import the update package".to_string()
    }
}
