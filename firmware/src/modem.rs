//! Radio modem on UART1.
//!
//! The modem runs the air interface and exchanges [`LinkMessage`] frames
//! with the gateway. [`ModemRadio`] queues outgoing frames for
//! [`run_modem_tx`]; [`run_modem_rx`] decodes incoming frames into
//! [`ModemEvent`]s for the [`ModemPacketSource`].

use core::cell::RefCell;

use defmt::{debug, info, warn};
use embassy_rp::uart::{Async, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use gateway_core::{
    InputError, PacketSource, RadioError, RadioTransport, Received, Switch, TransportEvent,
    MAX_PEERS,
};
use gateway_proto::NodeId;
use heapless::Vec;
use radio_proto::{LinkFramer, LinkMessage, Linked, MAX_LINK_FRAME, MAX_PACKET_SIZE};

/// Encoded frames waiting for the modem UART.
pub type LinkQueue = Channel<CriticalSectionRawMutex, Vec<u8, MAX_LINK_FRAME>, 8>;

/// Received packets and link status waiting for the gateway.
pub type EventQueue = Channel<CriticalSectionRawMutex, ModemEvent, 8>;

/// Paired nodes, shared between the gateway and the receive task.
pub type PeerTable = Mutex<CriticalSectionRawMutex, RefCell<Vec<NodeId, MAX_PEERS>>>;

#[derive(Debug, Clone, PartialEq, Eq, defmt::Format)]
pub enum ModemEvent {
    Packet(Vec<u8, MAX_PACKET_SIZE>),
    Transport(TransportEvent),
}

/// [`RadioTransport`] backed by the modem link.
pub struct ModemRadio {
    tx: &'static LinkQueue,
    peers: &'static PeerTable,
}

impl ModemRadio {
    #[must_use]
    pub fn new(tx: &'static LinkQueue, peers: &'static PeerTable) -> Self {
        Self { tx, peers }
    }

    fn queue(&self, message: LinkMessage<'_>) -> Result<(), RadioError> {
        let frame = message.to_vec().map_err(|_| RadioError::Oversized)?;
        self.tx.try_send(frame).map_err(|_| RadioError::QueueFull)
    }
}

impl RadioTransport for ModemRadio {
    fn send(&mut self, packet: &[u8]) -> Result<(), RadioError> {
        self.queue(LinkMessage::Packet(packet))
    }

    fn peers(&self, out: &mut [NodeId]) -> usize {
        self.peers.lock(|peers| {
            let peers = peers.borrow();
            let count = peers.len().min(out.len());
            out[..count].copy_from_slice(&peers[..count]);
            count
        })
    }

    fn add_peer(&mut self, id: NodeId) -> Result<(), RadioError> {
        let full = self.peers.lock(|peers| {
            let peers = peers.borrow();
            !peers.contains(&id) && peers.is_full()
        });
        if full {
            return Err(RadioError::PeerTableFull);
        }
        self.queue(LinkMessage::AddPeer(id))?;
        track(self.peers, id);
        Ok(())
    }

    fn remove_peer(&mut self, id: NodeId) -> Result<(), RadioError> {
        if !self.peers.lock(|peers| peers.borrow().contains(&id)) {
            return Err(RadioError::UnknownPeer);
        }
        self.queue(LinkMessage::RemovePeer(id))?;
        forget(self.peers, id);
        Ok(())
    }

    fn purge_peers(&mut self) -> Result<(), RadioError> {
        self.queue(LinkMessage::PurgePeers)?;
        self.peers.lock(|peers| peers.borrow_mut().clear());
        Ok(())
    }

    fn scan(&mut self, switch: Switch) -> Result<(), RadioError> {
        self.queue(LinkMessage::Scan(switch.is_start()))
    }

    fn pairing_mode(&mut self, switch: Switch) -> Result<(), RadioError> {
        self.queue(LinkMessage::PairingMode(switch.is_start()))
    }

    fn automatic_pairing(&mut self, switch: Switch) -> Result<(), RadioError> {
        self.queue(LinkMessage::AutomaticPairing(switch.is_start()))
    }
}

fn track(peers: &PeerTable, id: NodeId) {
    peers.lock(|peers| {
        let mut peers = peers.borrow_mut();
        if !peers.contains(&id) && peers.push(id).is_err() {
            warn!("peer table full, {} not tracked", id);
        }
    });
}

fn forget(peers: &PeerTable, id: NodeId) {
    peers.lock(|peers| peers.borrow_mut().retain(|peer| *peer != id));
}

/// [`PacketSource`] fed by [`run_modem_rx`].
pub struct ModemPacketSource {
    events: &'static EventQueue,
}

impl ModemPacketSource {
    #[must_use]
    pub fn new(events: &'static EventQueue) -> Self {
        Self { events }
    }
}

impl PacketSource for ModemPacketSource {
    async fn receive(&mut self, buf: &mut [u8]) -> Result<Received, InputError> {
        match self.events.receive().await {
            ModemEvent::Packet(packet) => {
                let dst = buf.get_mut(..packet.len()).ok_or(InputError::BufferOverflow)?;
                dst.copy_from_slice(&packet);
                Ok(Received::Packet(packet.len()))
            }
            ModemEvent::Transport(event) => Ok(Received::Transport(event)),
        }
    }
}

/// Decode modem frames into gateway events.
pub async fn run_modem_rx(
    mut rx: UartRx<'static, Async>,
    events: &'static EventQueue,
    peers: &'static PeerTable,
) -> ! {
    let mut framer = LinkFramer::new();
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            warn!("modem rx: {:?}", e);
            framer.reset();
            continue;
        }

        let event = match framer.push(byte[0]) {
            Linked::Pending => continue,
            Linked::Dropped(e) => {
                debug!("modem frame dropped: {:?}", e);
                continue;
            }
            Linked::Message(LinkMessage::Packet(packet)) => match Vec::from_slice(packet) {
                Ok(packet) => ModemEvent::Packet(packet),
                Err(()) => continue,
            },
            Linked::Message(LinkMessage::InitDone(id)) => {
                info!("modem up as {}", id);
                TransportEvent::InitDone(id).into()
            }
            Linked::Message(LinkMessage::Attach(id)) => {
                track(peers, id);
                TransportEvent::Attach(id).into()
            }
            Linked::Message(LinkMessage::AttachFailure(id)) => TransportEvent::AttachFailure(id).into(),
            Linked::Message(LinkMessage::Detach(id)) => {
                forget(peers, id);
                TransportEvent::Detach(id).into()
            }
            Linked::Message(LinkMessage::Found(id)) => TransportEvent::Found(id).into(),
            Linked::Message(other) => {
                debug!("unexpected modem message {:?}", other);
                continue;
            }
        };
        events.send(event).await;
    }
}

impl From<TransportEvent> for ModemEvent {
    fn from(event: TransportEvent) -> Self {
        ModemEvent::Transport(event)
    }
}

/// Write queued frames to the modem.
pub async fn run_modem_tx(mut tx: UartTx<'static, Async>, frames: &'static LinkQueue) -> ! {
    loop {
        let frame = frames.receive().await;
        if let Err(e) = tx.write(&frame).await {
            warn!("modem tx: {:?}", e);
        }
    }
}
