//! Tick pacing and deferred tasks for Gladius.
//!
//! Gladius never blocks. Everything that "waits" (a countdown, the no-camp
//! check, the delay between the end of a fight and the reset) is a task
//! queued for a future tick. Two pieces make that work:
//!
//! - [`TickClock`] paces the driver loop at a fixed rate, the way an external
//!   game loop would.
//! - [`TaskQueue`] holds one-shot and repeating tasks keyed by [`TaskId`];
//!   [`TaskQueue::advance`] moves the clock one tick forward and hands back
//!   every task that came due.
//!
//! Tasks are plain data. The owner of the queue decides what a task means
//! when it fires, and checks that the task is still the current one for its
//! purpose before acting on it.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* route the event */ }
//!         _ = clock.wait_for_tick() => {
//!             for (id, task) in tasks.advance() {
//!                 /* run task */
//!             }
//!             clock.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod clock;
mod queue;

pub use clock::{TickClock, TickConfig, TickInfo};
pub use queue::{RunnerDecision, TaskId, TaskQueue};
