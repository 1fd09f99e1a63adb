#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{UART1, USB};
use embassy_rp::uart::{Async, Config as UartConfig, Uart, UartRx, UartTx};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::pipe::Pipe;
use embassy_usb::class::cdc_acm::{Sender, State};
use embassy_usb::{Builder, Config as UsbConfig};
use heapless::Vec;
use radio_gateway::{
    configure_usb_serial, run_led, run_modem_rx, run_modem_tx, run_usb_tx, AliasTable,
    BoardHardware, EventQueue, Gateway, GatewayBridge, GatewayConfig, LedQueue, LinkQueue,
    ModemPacketSource, ModemRadio, PeerTable, PipeSink, TxPipe, UsbSerialSource,
    DEFAULT_FIRMWARE, DEFAULT_VERSION,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

/// Version reported on `/info`, from `FW_VERSION` at build time.
const FIRMWARE_VERSION: &str = match option_env!("FW_VERSION") {
    Some(version) => version,
    None => DEFAULT_VERSION,
};

type RadioGateway = GatewayBridge<
    UsbSerialSource,
    ModemPacketSource,
    BoardHardware,
    ModemRadio,
    AliasTable,
    PipeSink,
>;

/// Queues between the gateway task and the I/O tasks.
static TX_PIPE: StaticCell<TxPipe> = StaticCell::new();
static LINK_QUEUE: StaticCell<LinkQueue> = StaticCell::new();
static EVENT_QUEUE: StaticCell<EventQueue> = StaticCell::new();
static LED_QUEUE: StaticCell<LedQueue> = StaticCell::new();
static PEERS: StaticCell<PeerTable> = StaticCell::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// CDC-ACM state.
static CDC_STATE: StaticCell<State> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("radio gateway {} starting...", FIRMWARE_VERSION);

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    let tx_pipe: &'static TxPipe = TX_PIPE.init(Pipe::new());
    let link_queue: &'static LinkQueue = LINK_QUEUE.init(Channel::new());
    let event_queue: &'static EventQueue = EVENT_QUEUE.init(Channel::new());
    let led_queue: &'static LedQueue = LED_QUEUE.init(Channel::new());
    let peers: &'static PeerTable = PEERS.init(Mutex::new(RefCell::new(Vec::new())));

    // --- Modem UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 115_200;

    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (modem_tx, modem_rx) = uart.split();

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0x0001); // pid.codes test VID/PID
    usb_config.manufacturer = Some("Radio Gateway");
    usb_config.product = Some("Radio Gateway Dongle");
    usb_config.serial_number = Some("001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );

    let cdc_state = CDC_STATE.init(State::new());
    let (usb_tx, usb_rx) = configure_usb_serial(&mut builder, cdc_state).split();

    let usb_device = builder.build();

    // --- Gateway ---
    let led = Output::new(p.PIN_25, Level::Low);
    let relay = Output::new(p.PIN_16, Level::Low);

    let config = GatewayConfig {
        firmware: DEFAULT_FIRMWARE,
        version: FIRMWARE_VERSION,
        ..GatewayConfig::default()
    };
    let gateway = Gateway::new(
        config,
        BoardHardware::new(led_queue, relay),
        ModemRadio::new(link_queue, peers),
        AliasTable::new(),
        PipeSink::new(tx_pipe),
    );
    let bridge = GatewayBridge::new(
        UsbSerialSource::new(usb_rx),
        ModemPacketSource::new(event_queue),
        gateway,
    );

    // Spawn tasks (unwrap the SpawnToken, then spawn)
    spawner.spawn(usb_task(usb_device).unwrap());
    spawner.spawn(usb_tx_task(usb_tx, tx_pipe).unwrap());
    spawner.spawn(modem_rx_task(modem_rx, event_queue, peers).unwrap());
    spawner.spawn(modem_tx_task(modem_tx, link_queue).unwrap());
    spawner.spawn(led_task(led, led_queue).unwrap());
    spawner.spawn(gateway_task(bridge).unwrap());

    info!("radio gateway initialized, waiting for modem...");
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// USB transmit task - forwards published lines to the host.
#[embassy_executor::task]
async fn usb_tx_task(tx: Sender<'static, Driver<'static, USB>>, pipe: &'static TxPipe) {
    run_usb_tx(tx, pipe).await
}

/// Modem receive task - decodes link frames into gateway events.
#[embassy_executor::task]
async fn modem_rx_task(
    rx: UartRx<'static, Async>,
    events: &'static EventQueue,
    peers: &'static PeerTable,
) {
    run_modem_rx(rx, events, peers).await
}

/// Modem transmit task - writes queued link frames.
#[embassy_executor::task]
async fn modem_tx_task(tx: UartTx<'static, Async>, frames: &'static LinkQueue) {
    run_modem_tx(tx, frames).await
}

/// LED task - steady state, activity pulses and pairing blink.
#[embassy_executor::task]
async fn led_task(led: Output<'static>, commands: &'static LedQueue) {
    run_led(led, commands).await
}

/// Gateway task - the only owner of gateway state.
#[embassy_executor::task]
async fn gateway_task(mut bridge: RadioGateway) {
    bridge.run().await
}
