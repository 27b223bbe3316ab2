//! Message composition for responses.
//!
//! The cheering line depends only on the day number and challenge length.
//! Other messages summarise what an operation did.

/// Composes the human-readable lines attached to responses.
pub trait CheerMessages: Send + Sync {
    /// Encouragement for `current_day` of a `total_days` challenge.
    fn cheering(&self, current_day: u32, total_days: u32) -> String;

    fn toggled(&self, routine_name: &str, complete: bool) -> String {
        if complete {
            format!("'{routine_name}' done. Nice work!")
        } else {
            format!("'{routine_name}' marked as not done.")
        }
    }

    fn batch_updated(&self, updated: usize, changed: usize) -> String {
        format!("{updated} routines updated ({changed} changed).")
    }
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCheers;

impl CheerMessages for DefaultCheers {
    fn cheering(&self, current_day: u32, total_days: u32) -> String {
        let remaining = total_days.saturating_sub(current_day);
        match current_day {
            0 | 1 => "Day one. Every habit starts somewhere.".to_string(),
            d if d >= total_days => "Last day. Finish strong!".to_string(),
            d if d * 2 > total_days => {
                format!("Past the halfway mark, {remaining} days to go.")
            }
            d => format!("Day {d} of {total_days}. Keep the streak alive."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheering_tracks_position_in_challenge() {
        let cheers = DefaultCheers;
        assert!(cheers.cheering(1, 7).starts_with("Day one"));
        assert_eq!(cheers.cheering(3, 7), "Day 3 of 7. Keep the streak alive.");
        assert_eq!(cheers.cheering(5, 7), "Past the halfway mark, 2 days to go.");
        assert_eq!(cheers.cheering(7, 7), "Last day. Finish strong!");
    }

    #[test]
    fn default_toggle_and_batch_messages() {
        let cheers = DefaultCheers;
        assert!(cheers.toggled("Run", true).contains("done"));
        assert!(cheers.toggled("Run", false).contains("not done"));
        assert_eq!(cheers.batch_updated(4, 1), "4 routines updated (1 changed).");
    }
}
