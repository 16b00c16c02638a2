//! # Loopback Transport
//!
//! In-process transport for tests and soak runs. Clients and server share a
//! [`LoopbackHub`]; client → server traffic goes straight into the server's
//! event channel, server → client traffic is routed by [`LoopbackHub::pump`].
//!
//! Both lanes are delivered reliably and in order. A connect only succeeds
//! when host and port match the address the hub was created with.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tether_shared::{ConnectionId, Delivery};

use super::{ClientEvent, ClientTransport, NetworkCommand, NetworkEvent, ServerEndpoint, TransportStats};
use crate::error::ConnectError;

struct HubShared {
    host: String,
    port: u16,
    open: AtomicBool,
    next_id: AtomicU32,
    events: Sender<NetworkEvent>,
    clients: Mutex<HashMap<ConnectionId, Sender<ClientEvent>>>,
    stats: Mutex<TransportStats>,
}

impl HubShared {
    fn accepts(&self, host: &str, port: u16) -> bool {
        self.open.load(Ordering::Acquire) && self.host == host && self.port == port
    }
}

/// Router between loopback clients and one server endpoint.
pub struct LoopbackHub {
    shared: Arc<HubShared>,
    commands: Receiver<NetworkCommand>,
}

impl LoopbackHub {
    /// Creates a hub listening at `host:port` and the endpoint the server
    /// should be built with.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> (Self, ServerEndpoint) {
        let (event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();

        let shared = Arc::new(HubShared {
            host: host.into(),
            port,
            open: AtomicBool::new(true),
            next_id: AtomicU32::new(1),
            events: event_tx,
            clients: Mutex::new(HashMap::new()),
            stats: Mutex::new(TransportStats::default()),
        });

        let hub = Self {
            shared,
            commands: command_rx,
        };
        let endpoint = ServerEndpoint {
            events: event_rx,
            commands: command_tx,
        };
        (hub, endpoint)
    }

    /// Creates a disconnected client bound to this hub.
    #[must_use]
    pub fn client(&self) -> LoopbackClient {
        LoopbackClient {
            shared: Arc::clone(&self.shared),
            link: None,
        }
    }

    /// Routes every queued server command. Returns how many were handled.
    pub fn pump(&self) -> usize {
        let mut handled = 0;
        while let Ok(command) = self.commands.try_recv() {
            handled += 1;
            match command {
                NetworkCommand::Send { to, payload, .. } => {
                    let clients = self.shared.clients.lock();
                    let delivered = clients
                        .get(&to)
                        .is_some_and(|inbox| inbox.send(ClientEvent::Packet(payload.clone())).is_ok());
                    let mut stats = self.shared.stats.lock();
                    if delivered {
                        stats.record_send(payload.len());
                    } else {
                        stats.send_errors += 1;
                    }
                }
                NetworkCommand::Disconnect(id) => {
                    if let Some(inbox) = self.shared.clients.lock().remove(&id) {
                        let _ = inbox.send(ClientEvent::Disconnected);
                        tracing::debug!("Loopback dropped {}", id);
                    }
                }
                NetworkCommand::Shutdown => self.close(),
            }
        }
        handled
    }

    /// Stops accepting connections and drops every connected client.
    pub fn close(&self) {
        self.shared.open.store(false, Ordering::Release);
        for (_, inbox) in self.shared.clients.lock().drain() {
            let _ = inbox.send(ClientEvent::Disconnected);
        }
        tracing::info!("Loopback hub {}:{} closed", self.shared.host, self.shared.port);
    }

    /// Number of connected clients.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.clients.lock().len()
    }

    /// Server → client delivery statistics.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        *self.shared.stats.lock()
    }
}

struct Link {
    id: ConnectionId,
    inbox: Receiver<ClientEvent>,
}

/// Client half of the loopback transport.
pub struct LoopbackClient {
    shared: Arc<HubShared>,
    link: Option<Link>,
}

impl LoopbackClient {
    /// Connection id assigned by the hub, while connected.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.link.as_ref().map(|link| link.id)
    }
}

impl ClientTransport for LoopbackClient {
    fn connect(&mut self, host: &str, port: u16, nickname: &str) -> Result<(), ConnectError> {
        if self.link.is_some() {
            return Err(ConnectError::Busy("connected"));
        }
        if !self.shared.accepts(host, port) {
            return Err(ConnectError::Unreachable {
                host: host.to_string(),
                port,
            });
        }

        let id = ConnectionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (inbox_tx, inbox_rx) = unbounded();
        self.shared.clients.lock().insert(id, inbox_tx);

        let announced = self.shared.events.send(NetworkEvent::ClientConnected {
            id,
            nickname: nickname.to_string(),
        });
        if announced.is_err() {
            // Server endpoint is gone
            self.shared.clients.lock().remove(&id);
            return Err(ConnectError::Unreachable {
                host: host.to_string(),
                port,
            });
        }

        self.link = Some(Link { id, inbox: inbox_rx });
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            if self.shared.clients.lock().remove(&link.id).is_some() {
                let _ = self.shared.events.send(NetworkEvent::ClientDisconnected(link.id));
            }
        }
    }

    fn send(&mut self, _delivery: Delivery, payload: &[u8]) -> bool {
        let Some(link) = &self.link else {
            return false;
        };
        self.shared
            .events
            .send(NetworkEvent::PacketReceived {
                from: link.id,
                payload: payload.to_vec(),
            })
            .is_ok()
    }

    fn poll(&mut self) -> Option<ClientEvent> {
        let link = self.link.as_ref()?;
        match link.inbox.try_recv() {
            Ok(ClientEvent::Packet(payload)) => {
                self.shared.stats.lock().record_recv(payload.len());
                Some(ClientEvent::Packet(payload))
            }
            Ok(ClientEvent::Disconnected) => {
                self.link = None;
                Some(ClientEvent::Disconnected)
            }
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                self.link = None;
                Some(ClientEvent::Disconnected)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

impl Drop for LoopbackClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_announces_client() {
        let (hub, endpoint) = LoopbackHub::new("127.0.0.1", 7777);
        let mut client = hub.client();
        client.connect("127.0.0.1", 7777, "Alice").unwrap();

        let id = client.connection_id().unwrap();
        assert_eq!(
            endpoint.events.try_recv().unwrap(),
            NetworkEvent::ClientConnected {
                id,
                nickname: "Alice".into()
            }
        );
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_wrong_address_is_unreachable() {
        let (hub, endpoint) = LoopbackHub::new("127.0.0.1", 7777);
        let mut client = hub.client();
        let err = client.connect("127.0.0.1", 27015, "Alice").unwrap_err();
        assert!(matches!(err, ConnectError::Unreachable { port: 27015, .. }));
        assert!(!client.is_connected());
        assert!(endpoint.events.try_recv().is_err());
    }

    #[test]
    fn test_closed_hub_refuses() {
        let (hub, _endpoint) = LoopbackHub::new("h", 1);
        hub.close();
        let mut client = hub.client();
        assert!(client.connect("h", 1, "Bob").is_err());
    }

    #[test]
    fn test_pump_routes_to_recipient() {
        let (hub, endpoint) = LoopbackHub::new("h", 1);
        let mut a = hub.client();
        let mut b = hub.client();
        a.connect("h", 1, "A").unwrap();
        b.connect("h", 1, "B").unwrap();

        endpoint
            .commands
            .send(NetworkCommand::Send {
                to: b.connection_id().unwrap(),
                delivery: Delivery::ReliableOrdered,
                payload: vec![1, 2, 3],
            })
            .unwrap();
        assert_eq!(hub.pump(), 1);

        assert_eq!(a.poll(), None);
        assert_eq!(b.poll(), Some(ClientEvent::Packet(vec![1, 2, 3])));
        assert_eq!(hub.stats().packets_sent, 1);
    }

    #[test]
    fn test_server_disconnect_reaches_client() {
        let (hub, endpoint) = LoopbackHub::new("h", 1);
        let mut client = hub.client();
        client.connect("h", 1, "A").unwrap();
        let id = client.connection_id().unwrap();

        endpoint.commands.send(NetworkCommand::Disconnect(id)).unwrap();
        hub.pump();

        assert_eq!(client.poll(), Some(ClientEvent::Disconnected));
        assert!(!client.is_connected());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_client_send_and_disconnect_reach_server() {
        let (hub, endpoint) = LoopbackHub::new("h", 1);
        let mut client = hub.client();
        client.connect("h", 1, "A").unwrap();
        let id = client.connection_id().unwrap();
        let _ = endpoint.events.try_recv();

        assert!(client.send(Delivery::Unreliable, &[9]));
        client.disconnect();
        client.disconnect();

        assert_eq!(
            endpoint.events.try_recv().unwrap(),
            NetworkEvent::PacketReceived {
                from: id,
                payload: vec![9]
            }
        );
        assert_eq!(endpoint.events.try_recv().unwrap(), NetworkEvent::ClientDisconnected(id));
        assert!(endpoint.events.try_recv().is_err());
        assert!(!client.send(Delivery::Unreliable, &[9]));
    }
}
