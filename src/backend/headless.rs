//! Headless backend
//!
//! One virtual output of a fixed size and no input devices. Frame
//! callbacks are paced by a timer at the output's refresh rate so clients
//! keep drawing as they would on real hardware.

use std::time::{Duration, Instant};

use calloop::channel::{self, Channel, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::LoopHandle;
use log::{debug, info};

use crate::backend::BackendEvent;
use crate::compositor::{OutputDescriptor, OutputMode, Size};

/// Refresh rate of the virtual output, in mHz
pub const REFRESH_MHZ: i32 = 60_000;

pub struct Headless {
    size: Size,
    sender: Sender<BackendEvent>,
    channel: Option<Channel<BackendEvent>>,
}

impl Headless {
    pub fn new(size: Size) -> Self {
        let (sender, channel) = channel::channel();
        Self {
            size,
            sender,
            channel: Some(channel),
        }
    }

    /// The virtual output
    pub fn output(&self) -> OutputDescriptor {
        let mut desc = OutputDescriptor::new(
            "HEADLESS-1",
            vec![OutputMode {
                width: self.size.width,
                height: self.size.height,
                refresh: REFRESH_MHZ,
                preferred: true,
            }],
        );
        desc.make = "kestrel".to_string();
        desc.model = "headless".to_string();
        desc
    }

    /// Events describing the hardware present at start-up
    pub fn initial_events(&self) -> Vec<BackendEvent> {
        vec![BackendEvent::NewOutput(self.output())]
    }

    /// Sender for injecting events from elsewhere, e.g. another thread
    pub fn sender(&self) -> Sender<BackendEvent> {
        self.sender.clone()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000_000 / REFRESH_MHZ as u64)
    }

    /// Register the event channel and the frame timer. `on_event` receives
    /// injected backend events and `on_frame` the milliseconds since start.
    pub fn insert_into_loop<D, E, F>(
        &mut self,
        handle: &LoopHandle<'static, D>,
        mut on_event: E,
        mut on_frame: F,
    ) -> anyhow::Result<()>
    where
        D: 'static,
        E: FnMut(BackendEvent, &mut D) + 'static,
        F: FnMut(u32, &mut D) + 'static,
    {
        if let Some(channel) = self.channel.take() {
            handle
                .insert_source(channel, move |event, _, data| match event {
                    channel::Event::Msg(event) => on_event(event, data),
                    channel::Event::Closed => debug!("Headless event channel closed"),
                })
                .map_err(|e| anyhow::anyhow!("failed to insert headless channel: {}", e.error))?;
        }

        let interval = self.frame_interval();
        let start = Instant::now();
        handle
            .insert_source(Timer::from_duration(interval), move |_, _, data| {
                on_frame(start.elapsed().as_millis() as u32, data);
                TimeoutAction::ToDuration(interval)
            })
            .map_err(|e| anyhow::anyhow!("failed to insert frame timer: {}", e.error))?;

        info!(
            "Headless backend: {}x{} at {} Hz",
            self.size.width,
            self.size.height,
            REFRESH_MHZ / 1000
        );
        Ok(())
    }
}
