use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};
use esp_hal::uart::Uart;
use esp_hal::Async;
use log::{error, info, warn};

use crate::config::SERIAL_POLL_MS;
use crate::control::dispatcher::Dispatcher;
use crate::hw::flash::FlashKvStore;
use crate::protocol::Response;
use crate::robot::state::ArmContext;

const READ_CHUNK: usize = 32;

#[embassy_executor::task]
pub async fn serial_task(ctx: &'static ArmContext<FlashKvStore>, mut uart: Uart<'static, Async>) {
    let mut dispatcher = Dispatcher::new();
    let mut chunk = [0u8; READ_CHUNK];
    info!("[SERIAL_TASK] listening");

    loop {
        // Short reads keep the dispatcher polling while a move is reported.
        let read = Read::read(&mut uart, &mut chunk);
        match with_timeout(Duration::from_millis(SERIAL_POLL_MS), read).await {
            Ok(Ok(n)) => {
                for &byte in &chunk[..n] {
                    if let Some(response) = dispatcher.feed(byte) {
                        send(&mut uart, response).await;
                    }
                }
            }
            Ok(Err(e)) => warn!("[SERIAL_TASK] read failed: {:?}", e),
            Err(_) => {}
        }

        while let Some(response) = dispatcher.poll(ctx) {
            send(&mut uart, response).await;
        }
    }
}

async fn send(uart: &mut Uart<'static, Async>, response: Response) {
    let frame = match response.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            error!("[SERIAL_TASK] {response}: {e}");
            return;
        }
    };
    if let Err(e) = Write::write_all(uart, &frame).await {
        error!("[SERIAL_TASK] write failed: {:?}", e);
    }
}
