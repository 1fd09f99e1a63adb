//! USB CDC-ACM serial link to the host.

use defmt::{debug, info};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::Builder;
use gateway_core::{InputError, SerialError, SerialSink, SerialSource};

/// Full-speed bulk packet size.
pub const USB_PACKET_SIZE: usize = 64;

/// Published lines waiting for the host.
pub const TX_PIPE_SIZE: usize = 2048;

pub type TxPipe = Pipe<CriticalSectionRawMutex, TX_PIPE_SIZE>;

type UsbDriver = Driver<'static, USB>;

/// Host to gateway half of the serial link.
pub struct UsbSerialSource {
    rx: Receiver<'static, UsbDriver>,
}

impl UsbSerialSource {
    #[must_use]
    pub fn new(rx: Receiver<'static, UsbDriver>) -> Self {
        Self { rx }
    }
}

impl SerialSource for UsbSerialSource {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, InputError> {
        match self.rx.read_packet(buf).await {
            Ok(len) => Ok(len),
            Err(EndpointError::BufferOverflow) => Err(InputError::BufferOverflow),
            Err(EndpointError::Disabled) => {
                // Park until the host opens the port again.
                self.rx.wait_connection().await;
                Err(InputError::Disconnected)
            }
        }
    }
}

/// Gateway to host half: queues whole lines into a pipe drained by [`run_usb_tx`].
pub struct PipeSink {
    pipe: &'static TxPipe,
}

impl PipeSink {
    #[must_use]
    pub fn new(pipe: &'static TxPipe) -> Self {
        Self { pipe }
    }
}

impl SerialSink for PipeSink {
    fn write_line(&mut self, line: &[u8]) -> Result<(), SerialError> {
        // Never queue half a line.
        if self.pipe.free_capacity() < line.len() {
            return Err(SerialError::Busy);
        }
        match self.pipe.try_write(line) {
            Ok(written) if written == line.len() => Ok(()),
            Ok(_) => Err(SerialError::Dropped),
            Err(_) => Err(SerialError::Busy),
        }
    }
}

/// Forward queued lines to the host while it is connected.
pub async fn run_usb_tx(mut tx: Sender<'static, UsbDriver>, pipe: &'static TxPipe) -> ! {
    let mut buf = [0u8; USB_PACKET_SIZE];
    loop {
        tx.wait_connection().await;
        info!("host connected");

        loop {
            let len = pipe.read(&mut buf).await;
            if let Err(e) = tx.write_packet(&buf[..len]).await {
                debug!("usb tx: {:?}", e);
                break;
            }
            // A full packet ends the transfer only if followed by a short one.
            if len == USB_PACKET_SIZE && pipe.is_empty() && tx.write_packet(&[]).await.is_err() {
                break;
            }
        }
        info!("host disconnected");
    }
}

/// Configure the CDC-ACM class in the USB builder.
pub fn configure_usb_serial<'d>(
    builder: &mut Builder<'d, Driver<'d, USB>>,
    state: &'d mut State<'d>,
) -> CdcAcmClass<'d, Driver<'d, USB>> {
    CdcAcmClass::new(builder, state, USB_PACKET_SIZE as u16)
}
