//! MQTT transport backed by `rumqttc`.

use super::{Transport, TransportError};
use crate::config::BrokerSettings;
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use telesim_core::DeviceConfig;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long the delivery task gets to wind down after DISCONNECT is queued
const DELIVERY_DRAIN: Duration = Duration::from_secs(2);

/// Back-off before polling again after an event loop error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// One MQTT session per device. The access token is the MQTT user name.
pub struct MqttTransport {
    device: String,
    options: MqttOptions,
    capacity: usize,
    connect_timeout: Duration,
    client: Option<AsyncClient>,
    delivery: Option<JoinHandle<()>>,
}

impl MqttTransport {
    pub fn new(device: &DeviceConfig, broker: &BrokerSettings) -> Self {
        let client_id = format!("{}{}", broker.client_id_prefix, device.name);
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));
        options.set_clean_session(true);
        options.set_credentials(device.access_token.clone(), String::new());

        Self {
            device: device.name.clone(),
            options,
            capacity: broker.channel_capacity.max(1),
            connect_timeout: Duration::from_secs(broker.connect_timeout_secs),
            client: None,
            delivery: None,
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<u8, TransportError> {
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), self.capacity);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(return_code(ack.code)),
                    Ok(_) => continue,
                    Err(ConnectionError::ConnectionRefused(code)) => return Ok(return_code(code)),
                    Err(e) => return Err(TransportError::Connect(e.to_string())),
                }
            }
        };

        let ack = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::ConnectTimeout)??;

        if ack != super::ACK_ACCEPTED {
            return Ok(ack);
        }

        let device = self.device.clone();
        self.delivery = Some(tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(event) => debug!("[{}] MQTT event: {:?}", device, event),
                    Err(e) => {
                        warn!("[{}] MQTT event loop error: {}", device, e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        }));
        self.client = Some(client);

        Ok(ack)
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let result = match self.client.take() {
            Some(client) => client
                .disconnect()
                .await
                .map_err(|e| TransportError::Disconnect(e.to_string())),
            None => Ok(()),
        };

        if let Some(mut delivery) = self.delivery.take() {
            if tokio::time::timeout(DELIVERY_DRAIN, &mut delivery).await.is_err() {
                delivery.abort();
            }
        }

        result
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        // a teardown cut short by its timeout leaves the delivery task behind
        if let Some(delivery) = self.delivery.take() {
            delivery.abort();
        }
    }
}

fn return_code(code: ConnectReturnCode) -> u8 {
    match code {
        ConnectReturnCode::Success => 0,
        ConnectReturnCode::RefusedProtocolVersion => 1,
        ConnectReturnCode::BadClientId => 2,
        ConnectReturnCode::ServiceUnavailable => 3,
        ConnectReturnCode::BadUserNamePassword => 4,
        ConnectReturnCode::NotAuthorized => 5,
    }
}
