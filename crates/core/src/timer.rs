//! Cancellable auto-hide timers.
//!
//! A scheduled hide is addressed by conversation, session instance and the
//! session generation current at scheduling time. Cancellation is best
//! effort: a firing that raced past cancellation still carries its tag and
//! is discarded by the session when the tag no longer matches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use codegate_protocol::ConversationId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// A hide that became due, tagged with the state it was scheduled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HideDue {
	pub conversation_id: ConversationId,
	/// Registry-unique id of the session instance that scheduled the hide.
	pub instance: u64,
	pub generation: u64,
}

/// Handle to a scheduled hide. Dropping the handle cancels it.
#[derive(Debug)]
pub struct HideTimer {
	generation: u64,
	cancelled: Arc<AtomicBool>,
	task: Option<JoinHandle<()>>,
}

impl HideTimer {
	fn new(generation: u64, cancelled: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> Self {
		Self { generation, cancelled, task }
	}

	/// Generation this timer was tagged with.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	/// Cancels the hide. A firing already in flight is left to the generation check.
	pub fn cancel(self) {
		trace!(target = "codegate.timer", generation = self.generation, "hide timer cancelled");
	}
}

impl Drop for HideTimer {
	fn drop(&mut self) {
		self.cancelled.store(true, Ordering::SeqCst);
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}
}

/// Schedules hides on behalf of sessions.
pub trait HideScheduler: Send + Sync + 'static {
	/// Schedules `due` to be delivered after the configured delay.
	///
	/// Must not block the caller.
	fn schedule(&self, due: HideDue) -> HideTimer;
}

/// Scheduler backed by tokio tasks; due hides arrive on an unbounded channel.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
	delay: Duration,
	tx: mpsc::UnboundedSender<HideDue>,
}

impl TokioScheduler {
	/// Creates a scheduler and the receiver its due hides are delivered to.
	pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<HideDue>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { delay, tx }, rx)
	}

	pub fn delay(&self) -> Duration {
		self.delay
	}
}

impl HideScheduler for TokioScheduler {
	fn schedule(&self, due: HideDue) -> HideTimer {
		let cancelled = Arc::new(AtomicBool::new(false));
		let flag = Arc::clone(&cancelled);
		let tx = self.tx.clone();
		let delay = self.delay;
		let generation = due.generation;

		let task = tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			if !flag.load(Ordering::SeqCst) {
				trace!(target = "codegate.timer", conversation = %due.conversation_id, generation = due.generation, "hide due");
				let _ = tx.send(due);
			}
		});

		HideTimer::new(generation, cancelled, Some(task))
	}
}

/// A hide recorded by [`ManualScheduler`].
#[derive(Debug, Clone)]
struct ManualEntry {
	due: HideDue,
	cancelled: Arc<AtomicBool>,
	fired: bool,
}

/// Scheduler that only records hides; tests decide when they fire.
#[derive(Debug, Default)]
pub struct ManualScheduler {
	entries: Mutex<Vec<ManualEntry>>,
}

impl ManualScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every hide scheduled so far, in scheduling order.
	pub fn scheduled(&self) -> Vec<HideDue> {
		self.entries.lock().iter().map(|entry| entry.due.clone()).collect()
	}

	/// Hides that are neither cancelled nor fired.
	pub fn live(&self) -> Vec<HideDue> {
		self.entries
			.lock()
			.iter()
			.filter(|entry| !entry.fired && !entry.cancelled.load(Ordering::SeqCst))
			.map(|entry| entry.due.clone())
			.collect()
	}

	/// Marks every live hide as fired and returns them for delivery.
	pub fn fire_live(&self) -> Vec<HideDue> {
		let mut entries = self.entries.lock();
		entries
			.iter_mut()
			.filter(|entry| !entry.fired && !entry.cancelled.load(Ordering::SeqCst))
			.map(|entry| {
				entry.fired = true;
				entry.due.clone()
			})
			.collect()
	}
}

impl HideScheduler for ManualScheduler {
	fn schedule(&self, due: HideDue) -> HideTimer {
		let cancelled = Arc::new(AtomicBool::new(false));
		let generation = due.generation;
		self.entries.lock().push(ManualEntry {
			due,
			cancelled: Arc::clone(&cancelled),
			fired: false,
		});
		HideTimer::new(generation, cancelled, None)
	}
}
