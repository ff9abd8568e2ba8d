//! A cooperative, tick-driven task queue.
//!
//! This is the host context binding cells are called *from*: every task runs to completion on
//! the thread that calls [`TickScheduler::tick`], one after the other, so anything a task does to
//! a cell (and everything that propagates from it) has settled before the next task starts.

use std::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	mem,
	panic::{self, AssertUnwindSafe},
	rc::Rc,
};

use thiserror::Error;

/// Default number of task panics tolerated before a [`TickScheduler`] shuts itself off.
pub const DEFAULT_PANIC_LIMIT: u32 = 5;

/// The panic count decays by one every this many ticks.
const PANIC_DECAY_TICKS: u64 = 5;

/// Returned when scheduling on a [`TickScheduler`] that has shut itself off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
	/// Too many tasks panicked; no further tasks are accepted.
	#[error("the scheduler no longer accepts tasks")]
	Rejected,
}

/// Cancellation handle for one scheduled task.
#[derive(Clone)]
pub struct ScheduleHandle {
	cancelled: Rc<Cell<bool>>,
	scheduled_at: u64,
	delay: u32,
}

impl ScheduleHandle {
	/// Prevents the task from running, if it hasn't yet.
	pub fn cancel(&self) {
		self.cancelled.set(true);
	}

	/// Whether [`.cancel()`](`ScheduleHandle::cancel`) was called.
	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.cancelled.get()
	}

	/// The tick this task was scheduled on.
	#[must_use]
	pub fn scheduled_at(&self) -> u64 {
		self.scheduled_at
	}

	/// The tick the task becomes due on.
	#[must_use]
	pub fn due_at(&self) -> u64 {
		self.scheduled_at + u64::from(self.delay)
	}
}

impl Debug for ScheduleHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ScheduleHandle")
			.field("scheduled_at", &self.scheduled_at)
			.field("delay", &self.delay)
			.field("cancelled", &self.cancelled.get())
			.finish()
	}
}

struct Task {
	run: Box<dyn FnOnce()>,
	handle: ScheduleHandle,
}

struct State {
	current_tick: u64,
	tasks: Vec<Task>,
	panics: u32,
	panic_limit: u32,
	accepting: bool,
}

/// Single-threaded task queue driven by explicit [`.tick()`](`TickScheduler::tick`) calls.
///
/// Cloning yields another handle to the same queue, so tasks can schedule follow-ups.
#[derive(Clone)]
pub struct TickScheduler {
	state: Rc<RefCell<State>>,
}

impl Default for TickScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for TickScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("TickScheduler")
			.field("current_tick", &state.current_tick)
			.field("pending", &state.tasks.len())
			.field("panics", &state.panics)
			.field("accepting", &state.accepting)
			.finish()
	}
}

impl TickScheduler {
	/// Creates a scheduler at tick `0` with the [`DEFAULT_PANIC_LIMIT`].
	#[must_use]
	pub fn new() -> Self {
		Self::with_panic_limit(DEFAULT_PANIC_LIMIT)
	}

	/// Creates a scheduler that shuts itself off once `panic_limit` task panics accumulate.
	#[must_use]
	pub fn with_panic_limit(panic_limit: u32) -> Self {
		Self {
			state: Rc::new(RefCell::new(State {
				current_tick: 0,
				tasks: Vec::new(),
				panics: 0,
				panic_limit: panic_limit.max(1),
				accepting: true,
			})),
		}
	}

	/// Runs `task` on the next tick.
	///
	/// # Errors
	///
	/// [`ScheduleError::Rejected`] iff the scheduler shut itself off.
	pub fn schedule(&self, task: impl 'static + FnOnce()) -> Result<ScheduleHandle, ScheduleError> {
		self.schedule_in(1, task)
	}

	/// Runs `task` once `delay` ticks have passed.
	///
	/// A task scheduled while a tick is being processed never runs during that same tick,
	/// even with a `delay` of `0`.
	///
	/// # Errors
	///
	/// [`ScheduleError::Rejected`] iff the scheduler shut itself off.
	pub fn schedule_in(
		&self,
		delay: u32,
		task: impl 'static + FnOnce(),
	) -> Result<ScheduleHandle, ScheduleError> {
		let mut state = self.state.borrow_mut();
		if !state.accepting {
			return Err(ScheduleError::Rejected);
		}

		let handle = ScheduleHandle {
			cancelled: Rc::new(Cell::new(false)),
			scheduled_at: state.current_tick,
			delay,
		};
		state.tasks.push(Task {
			run: Box::new(task),
			handle: handle.clone(),
		});
		Ok(handle)
	}

	/// Advances to the next tick and runs every task that became due, in scheduling order.
	///
	/// A panicking task is caught and counted here; the remaining due tasks still run.
	pub fn tick(&self) {
		let (now, queued) = {
			let mut state = self.state.borrow_mut();
			state.current_tick += 1;
			let now = state.current_tick;
			if now % PANIC_DECAY_TICKS == 0 {
				state.panics = state.panics.saturating_sub(1);
			}
			(now, mem::take(&mut state.tasks))
		};

		// Cancelled tasks are dropped here, outside the borrow.
		let (due, mut pending): (Vec<_>, Vec<_>) = queued
			.into_iter()
			.filter(|task| !task.handle.is_cancelled())
			.partition(|task| task.handle.due_at() <= now);
		{
			let mut state = self.state.borrow_mut();
			pending.append(&mut state.tasks);
			state.tasks = pending;
		}

		for Task { run, handle } in due {
			if !self.accepts_schedules() {
				break;
			}
			if handle.is_cancelled() {
				continue;
			}
			if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(run)) {
				self.on_task_panic(now, &handle, payload.as_ref());
			}
		}
	}

	fn on_task_panic(&self, tick: u64, handle: &ScheduleHandle, payload: &(dyn Any + Send)) {
		let message = payload
			.downcast_ref::<&str>()
			.copied()
			.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
			.unwrap_or("<non-string panic payload>");

		let discarded = {
			let mut state = self.state.borrow_mut();
			state.panics += 1;
			tracing::warn!(
				tick,
				scheduled_at = handle.scheduled_at,
				panics = state.panics,
				panic_message = message,
				"scheduled task panicked"
			);
			if state.panics < state.panic_limit {
				return;
			}

			tracing::error!(
				panics = state.panics,
				limit = state.panic_limit,
				discarded = state.tasks.len(),
				"panic limit reached, scheduler shut off"
			);
			state.accepting = false;
			mem::take(&mut state.tasks)
		};
		// Task captures may call back into the scheduler when dropped.
		drop(discarded);
	}

	/// The number of ticks processed so far.
	#[must_use]
	pub fn current_tick(&self) -> u64 {
		self.state.borrow().current_tick
	}

	/// Number of tasks waiting to run, including cancelled ones not yet swept.
	#[must_use]
	pub fn pending(&self) -> usize {
		self.state.borrow().tasks.len()
	}

	/// Whether new tasks are still accepted.
	#[must_use]
	pub fn accepts_schedules(&self) -> bool {
		self.state.borrow().accepting
	}
}
