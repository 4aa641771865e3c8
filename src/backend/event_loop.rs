//! Event loop integration
//!
//! A thin wrapper over calloop that owns the loop and its stop signal. The
//! loop data is the whole server state, so every source callback gets
//! `&mut D` without any locking.

use std::time::Duration;

use calloop::{EventLoop as CalLoop, LoopHandle, LoopSignal};
use log::{debug, error};

/// Kestrel event loop wrapper
pub struct EventLoop<D: 'static> {
    /// Calloop event loop
    event_loop: CalLoop<'static, D>,
    /// Loop signal for waking/stopping
    signal: LoopSignal,
}

impl<D: 'static> EventLoop<D> {
    /// Create a new event loop
    pub fn new() -> anyhow::Result<Self> {
        let event_loop = CalLoop::try_new()?;
        let signal = event_loop.get_signal();

        Ok(Self { event_loop, signal })
    }

    /// Get a handle to register event sources
    pub fn handle(&self) -> LoopHandle<'static, D> {
        self.event_loop.handle()
    }

    /// Get the loop signal for waking or stopping
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Run one iteration of the event loop
    pub fn dispatch(&mut self, timeout: Option<Duration>, data: &mut D) -> anyhow::Result<()> {
        self.event_loop.dispatch(timeout, data)?;
        Ok(())
    }

    /// Run the event loop until stopped, calling `after_dispatch` after
    /// every iteration
    pub fn run<F>(&mut self, data: &mut D, after_dispatch: F) -> anyhow::Result<()>
    where
        F: FnMut(&mut D),
    {
        debug!("Starting event loop");
        if let Err(e) = self.event_loop.run(None, data, after_dispatch) {
            error!("Event loop error: {}", e);
            return Err(e.into());
        }
        debug!("Event loop stopped");
        Ok(())
    }

    /// Stop the event loop
    pub fn stop(&self) {
        self.signal.stop();
    }

    /// Wake the event loop from another thread
    pub fn wake(&self) {
        self.signal.wakeup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calloop::timer::{TimeoutAction, Timer};

    #[test]
    fn test_event_loop_new() {
        let event_loop = EventLoop::<()>::new();
        assert!(event_loop.is_ok());
    }

    #[test]
    fn test_event_loop_dispatch() {
        let mut event_loop = EventLoop::<u32>::new().unwrap();
        let mut data = 0;
        // Dispatch with zero timeout should return immediately
        let result = event_loop.dispatch(Some(Duration::ZERO), &mut data);
        assert!(result.is_ok());
        assert_eq!(data, 0);
    }

    #[test]
    fn test_run_until_stopped() {
        let mut event_loop = EventLoop::<u32>::new().unwrap();
        let signal = event_loop.signal();
        event_loop
            .handle()
            .insert_source(Timer::immediate(), move |_, _, data: &mut u32| {
                *data += 1;
                signal.stop();
                TimeoutAction::Drop
            })
            .unwrap();

        let mut data = 0;
        let mut iterations = 0;
        event_loop.run(&mut data, |_| iterations += 1).unwrap();
        assert_eq!(data, 1);
        assert!(iterations >= 1);
    }
}
