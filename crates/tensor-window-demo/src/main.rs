use std::thread;
use std::time::Duration;

use anyhow::Context;
use tensor_window::interop::cuda::DeviceBuffer;
use tensor_window::logging::{init_logging, LoggingConfig};
use tensor_window::Window;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// Red on the top half, blue on the left half, opaque everywhere.
fn quadrants(width: u32, height: u32) -> Vec<f32> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let red = if y < height / 2 { 1.0 } else { 0.0 };
            let blue = if x < width / 2 { 1.0 } else { 0.0 };
            pixels.extend_from_slice(&[red, 0.0, blue, 1.0]);
        }
    }
    pixels
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let buffer = DeviceBuffer::from_host(&quadrants(WIDTH, HEIGHT), WIDTH, HEIGHT)
        .context("failed to upload demo image to the device")?;

    let window = Window::new(WIDTH, HEIGHT, "Example").context("failed to open window")?;
    window.submit(&buffer.image()).context("failed to submit frame")?;
    log::info!("frame submitted; closing in 5s");

    thread::sleep(Duration::from_secs(5));

    window.close();
    window.join()?;
    Ok(())
}
