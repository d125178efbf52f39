use crash::{CrashAck, CrashDuration, CrashIntensity, Notification};

pub(super) fn triggered(
    label: &str,
    intensity: CrashIntensity,
    duration: CrashDuration,
    ack: &CrashAck,
) -> Notification {
    let description = ack.message.clone().unwrap_or_else(|| {
        format!(
            "Market crash triggered for {} ({} for {})",
            label, intensity, duration
        )
    });
    Notification::success("Market crash triggered", description)
}

/// The reset count, when the backend reports one, is always surfaced.
pub(super) fn ended(label: &str, ack: &CrashAck) -> Notification {
    let base = ack
        .message
        .clone()
        .unwrap_or_else(|| format!("Market crash ended for {}", label));
    let description = match ack.reset_count {
        Some(1) => format!("{}: 1 item price reset", base),
        Some(n) => format!("{}: {} item prices reset", base, n),
        None => base,
    };
    Notification::success("Market crash ended", description)
}

pub(super) fn expired(label: &str) -> Notification {
    Notification::info(
        "Market crash over",
        format!("The market crash on {} has run its course", label),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_falls_back_to_local_wording() {
        let n = triggered(
            "Harbour",
            CrashIntensity::try_from(75).unwrap(),
            CrashDuration::try_from(30).unwrap(),
            &CrashAck::default(),
        );
        assert_eq!(n.description, "Market crash triggered for Harbour (75% for 30 min)");

        let n = triggered(
            "Harbour",
            CrashIntensity::default(),
            CrashDuration::default(),
            &CrashAck::default().with_message("Crash started"),
        );
        assert_eq!(n.description, "Crash started");
    }

    #[test]
    fn test_end_surfaces_reset_count() {
        let ack = CrashAck::default().with_reset_count(7);
        assert_eq!(ended("Harbour", &ack).description, "Market crash ended for Harbour: 7 item prices reset");

        let ack = CrashAck::default().with_message("Done").with_reset_count(1);
        assert_eq!(ended("Harbour", &ack).description, "Done: 1 item price reset");

        assert_eq!(ended("Harbour", &CrashAck::default()).description, "Market crash ended for Harbour");
    }
}
