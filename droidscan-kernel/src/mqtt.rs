use crate::config::MqttConf;
use crate::events::{Event, EventSink};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tokio::task;
use tracing::{debug, warn};

pub const DEVICE_TOPIC: &str = "droidscan/devices/update@v1";
pub const SCAN_TOPIC: &str = "droidscan/scans/status@v1";
pub const POLLING_TOPIC: &str = "droidscan/polling/update@v1";

pub fn topic_for(event: &Event) -> &'static str {
    match event {
        Event::DeviceUpdate { .. } => DEVICE_TOPIC,
        Event::StatusUpdate(_) => SCAN_TOPIC,
        Event::PollingUpdate(_) => POLLING_TOPIC,
    }
}

/// Miroir MQTT du bus d'événements (publication uniquement)
pub struct MqttMirror {
    client: AsyncClient,
}

impl MqttMirror {
    /// Crée le client et lance la tâche qui fait tourner l'eventloop rumqttc
    pub fn spawn(conf: &MqttConf) -> Self {
        let mut opts = MqttOptions::new(conf.client_id.clone(), conf.host.clone(), conf.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(notification) => debug!("[mqtt] {notification:?}"),
                    Err(e) => {
                        warn!("[mqtt] connection error: {e:?}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Self { client }
    }
}

impl EventSink for MqttMirror {
    fn publish(&self, event: Event) {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                warn!("[mqtt] cannot encode event: {e}");
                return;
            }
        };
        // try_publish : jamais bloquant, file pleine = événement perdu
        if let Err(e) = self.client.try_publish(topic_for(&event), QoS::AtLeastOnce, false, payload) {
            debug!("[mqtt] publish dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PollingState;
    use crate::models::TrackedDevice;

    #[test]
    fn test_topics_by_event_kind() {
        assert_eq!(topic_for(&Event::device(TrackedDevice::pending_authorization("A"))), DEVICE_TOPIC);
        assert_eq!(topic_for(&Event::polling(PollingState::Started, None)), POLLING_TOPIC);
    }
}
