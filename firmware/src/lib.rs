//! USB Talk to radio gateway for RP2040.
//!
//! This crate provides the embedded side of the gateway: it connects the
//! platform-agnostic [`gateway_core`] to the USB serial link, the radio
//! modem and the board outputs.
//!
//! # Overview
//!
//! The firmware runs on a Raspberry Pi Pico (RP2040) and:
//! 1. Receives USB Talk lines from the host over USB CDC-ACM
//! 2. Routes them to the local LED and relay, or to radio nodes
//! 3. Publishes everything the radio modem receives back to the host
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | UART1 TX | 8    | Radio modem receive |
//! | UART1 RX | 9    | Radio modem transmit |
//! | Relay    | 16   | Power relay output |
//! | LED      | 25   | On-board LED (state, activity, pairing) |
//!
//! # Architecture
//!
//! The firmware uses the Embassy async runtime. One task owns the
//! [`GatewayBridge`] and is the only one touching gateway state; the others
//! move bytes:
//!
//! - **USB Task**: Manages the USB device stack
//! - **USB TX Task**: Drains published lines from a pipe to the host
//! - **Modem RX/TX Tasks**: Frame link messages on the modem UART
//! - **LED Task**: Runs LED pulses and blinking
//!
//! # Modules
//!
//! - [`usb_serial`]: USB CDC-ACM serial link ([`UsbSerialSource`], [`PipeSink`])
//! - [`modem`]: UART radio modem ([`ModemRadio`], [`ModemPacketSource`])
//! - [`board`]: LED and relay ([`BoardHardware`])
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)

#![no_std]

// Re-export core types for convenience
pub use gateway_core::{
    AliasTable, BridgeError, Gateway, GatewayBridge, GatewayConfig, Hardware, HardwareError,
    Indication, PacketSource, RadioError, RadioTransport, Received, SerialSink, SerialSource,
    TransportEvent, DEFAULT_FIRMWARE, DEFAULT_VERSION,
};

pub mod board;
pub mod modem;
pub mod usb_serial;

pub use board::{run_led, BoardHardware, LedCommand, LedQueue};
pub use modem::{
    run_modem_rx, run_modem_tx, EventQueue, LinkQueue, ModemEvent, ModemPacketSource, ModemRadio,
    PeerTable,
};
pub use usb_serial::{configure_usb_serial, run_usb_tx, PipeSink, TxPipe, UsbSerialSource};
