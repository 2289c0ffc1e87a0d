use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as Age;
use courier_shared::error::CourierError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::MaintenanceConfig;
use crate::services::Services;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub sessions_deleted: u64,
    pub signed_pre_keys_purged: u64,
}

/// One maintenance pass: delete sessions idle past `session_max_age_days`
/// and signed pre-keys retired longer than the retention window.
pub async fn run_maintenance(
    services: &Services,
    clock: &dyn Clock,
    config: &MaintenanceConfig,
) -> Result<MaintenanceReport, CourierError> {
    let now = clock.now();
    let sessions_deleted = services
        .sessions
        .cleanup(now - Age::days(config.session_max_age_days))
        .await?;
    let signed_pre_keys_purged = services
        .keys
        .purge_retired_signed_pre_keys(now - Age::days(config.signed_pre_key_retention_days))
        .await?;
    Ok(MaintenanceReport {
        sessions_deleted,
        signed_pre_keys_purged,
    })
}

/// Runs [`run_maintenance`] once at startup and then every
/// `cleanup_interval_seconds` until shutdown is signalled.
pub fn spawn_maintenance(
    services: Services,
    clock: Arc<dyn Clock>,
    config: MaintenanceConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.cleanup_interval_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match run_maintenance(&services, clock.as_ref(), &config).await {
                        Ok(report) => tracing::info!(
                            sessions_deleted = report.sessions_deleted,
                            signed_pre_keys_purged = report.signed_pre_keys_purged,
                            "maintenance pass complete"
                        ),
                        Err(e) => tracing::warn!(error = %e, "maintenance pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("maintenance task shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use courier_shared::ids::UserId;

    use super::*;
    use crate::services::testing::services;
    use crate::shutdown::ShutdownHandle;

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn idle_sessions_and_old_retired_keys_are_removed() {
        let (svc, clock) = services();
        let (alice, bob) = (UserId::new(), UserId::new());
        let (conversation, _) = svc.conversations.get_or_create(alice, bob).await.unwrap();
        svc.sessions
            .create_session(conversation.id, alice, bob)
            .await
            .unwrap();
        svc.keys
            .upload_signed_pre_key(alice, 1, &b64(&[1; 32]), &b64(&[2; 64]))
            .await
            .unwrap();
        svc.keys
            .upload_signed_pre_key(alice, 2, &b64(&[3; 32]), &b64(&[4; 64]))
            .await
            .unwrap();

        let config = MaintenanceConfig::default();
        let report = run_maintenance(&svc, clock.as_ref(), &config).await.unwrap();
        assert_eq!(report, MaintenanceReport::default());

        clock.advance(Age::days(91));
        let report = run_maintenance(&svc, clock.as_ref(), &config).await.unwrap();
        assert_eq!(report.sessions_deleted, 1);
        assert_eq!(report.signed_pre_keys_purged, 1);
        assert!(svc.sessions.session(conversation.id, alice).await.unwrap().is_none());
        assert_eq!(svc.keys.signed_pre_key(alice).await.unwrap().key_id, 2);
    }

    #[tokio::test]
    async fn spawned_task_stops_on_shutdown() {
        let (svc, clock) = services();
        let handle = ShutdownHandle::new();
        let task = spawn_maintenance(
            svc,
            clock,
            MaintenanceConfig::default(),
            handle.subscribe(),
        );
        handle.trigger();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
