use std::sync::Arc;
use std::time::Duration;

use smsdesk_core::session::SessionStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Periodically drops idle conversations. The first sweep runs one full
/// interval after start.
pub fn spawn(sessions: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let removed = sessions.sweep_expired_now();
            debug!(
                event_name = "session.sweeper_tick",
                correlation_id = "sweeper",
                removed,
                "session sweeper tick"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use smsdesk_core::session::{SessionConfig, SessionStore};

    use super::spawn;

    #[tokio::test]
    async fn sweeper_removes_idle_conversations_in_background() {
        let sessions = Arc::new(SessionStore::new(SessionConfig::new(10, chrono::Duration::hours(1))));
        sessions.record_turn_at("+15550001111", "old", "reply", Utc::now() - chrono::Duration::hours(2));
        sessions.record_turn("+15550002222", "fresh", "reply");

        let handle = spawn(sessions.clone(), Duration::from_millis(20));
        for _ in 0..50 {
            if sessions.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(sessions.len(), 1);
        assert!(sessions.get_conversation("+15550002222").is_found());
    }
}
