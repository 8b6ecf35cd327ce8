//! Host-side transmit timer driver.
//!
//! The scheduler only exposes timings; something has to turn them into
//! firings. [`TransmitTimer`] runs a dedicated thread that repeatedly asks
//! the context for the next event, waits out `send_offset`, and invokes the
//! caller's send hook with the due flow id. The wait doubles as the stop
//! channel, so shutdown never blocks behind a sleeping timer.
//!
//! A hook that runs longer than the gap to the following event delays that
//! event; the driver does not try to catch up by firing twice.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;

use crate::clock::Clock;
use crate::context::ScheduleContext;
use crate::error::Result;

/// A running timer driver. Dropping it disarms the timer and joins the
/// thread.
pub struct TransmitTimer {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl TransmitTimer {
    /// Start firing `on_send(flow_id)` at each scheduled instant, reading
    /// time from `clock`.
    ///
    /// Fails with [`Error::NoPlan`](crate::Error::NoPlan) when the context
    /// has not dispatched; the context moves to Armed otherwise.
    pub fn start<C, F>(ctx: Arc<ScheduleContext>, clock: C, mut on_send: F) -> Result<Self>
    where
        C: Clock + 'static,
        F: FnMut(u32) + Send + 'static,
    {
        // Fail before spawning when there is nothing to drive.
        ctx.next_event(clock.now_ns())?;

        let (stop, rx) = mpsc::channel();
        ctx.set_armed(true);
        let handle = std::thread::spawn(move || {
            loop {
                let Ok(next) = ctx.next_event(clock.now_ns()) else {
                    // Plan was retired underneath us; disarm.
                    break;
                };
                match rx.recv_timeout(Duration::from_nanos(next.send_offset)) {
                    Err(RecvTimeoutError::Timeout) => on_send(next.flow_id),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            ctx.set_armed(false);
            debug!("transmit timer disarmed");
        });

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Disarm and join the driver thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TransmitTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::context::Direction;
    use crate::context::ScheduleState;
    use crate::error::Error;
    use crate::flow::FlowEntry;
    use std::sync::Mutex;
    use std::sync::mpsc::channel;

    const MS: u64 = 1_000_000;

    fn entry(flow_id: u32, period: u64, base_offset: u64) -> FlowEntry {
        FlowEntry {
            flow_id,
            buffer_id: 0,
            period,
            base_offset,
            packet_size: 64,
        }
    }

    #[test]
    fn start_without_plan_fails() {
        let ctx = Arc::new(ScheduleContext::new(false));
        let result = TransmitTimer::start(Arc::clone(&ctx), SystemClock, |_| {});
        assert!(matches!(result, Err(Error::NoPlan)));
        assert_eq!(ctx.state(), ScheduleState::Empty);
    }

    #[test]
    fn fires_flows_and_disarms_on_stop() {
        let ctx = Arc::new(ScheduleContext::new(false));
        ctx.insert(Direction::Send, entry(1, 4 * MS, 0)).unwrap();
        ctx.insert(Direction::Send, entry(2, 8 * MS, 2 * MS)).unwrap();
        ctx.dispatch().unwrap();

        let (tx, rx) = channel();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let timer = TransmitTimer::start(Arc::clone(&ctx), SystemClock, move |flow_id| {
            sink.lock().unwrap().push(flow_id);
            let _ = tx.send(());
        })
        .unwrap();
        assert_eq!(ctx.state(), ScheduleState::Armed);

        // Wait for a handful of firings, then stop.
        for _ in 0..6 {
            rx.recv_timeout(Duration::from_secs(2))
                .expect("timer stopped firing");
        }
        timer.stop();
        assert_eq!(ctx.state(), ScheduleState::Planned);

        let fired = fired.lock().unwrap();
        assert!(fired.len() >= 6);
        // Macro-period 8ms holds flow 1 at 0 and 4ms, flow 2 at 2ms; both
        // flows must show up and flow 1 twice as often.
        let ones = fired.iter().filter(|&&id| id == 1).count();
        let twos = fired.iter().filter(|&&id| id == 2).count();
        assert!(ones > 0 && twos > 0, "firings: {fired:?}");
        assert!(ones >= twos, "firings: {fired:?}");
    }

    #[test]
    fn drop_stops_the_driver() {
        let ctx = Arc::new(ScheduleContext::new(false));
        ctx.insert(Direction::Send, entry(1, MS, 0)).unwrap();
        ctx.dispatch().unwrap();

        let timer =
            TransmitTimer::start(Arc::clone(&ctx), SystemClock, |_| {}).unwrap();
        drop(timer);
        assert_eq!(ctx.state(), ScheduleState::Planned);
    }
}
