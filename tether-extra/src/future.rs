//! [`Bindable`] <=> [`Future`]/[`Stream`] adapters.

use std::{
	cell::Cell,
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};

use futures_channel::{mpsc, oneshot};
use futures_lite::{Stream, StreamExt};
use pin_project::{pin_project, pinned_drop};
use tether::{Bindable, BindableList, ChangeReason, ListenerId, WeakBindable, WeakBindableList};

/// Resolves with the next value of a [`Bindable`]. See [`next_change`].
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless polled"]
pub struct NextChange<T: 'static> {
	#[pin]
	receiver: oneshot::Receiver<T>,
	source: WeakBindable<T>,
	listener: Option<ListenerId>,
}

/// Creates a future that resolves with `cell`'s next new value.
///
/// It resolves with [`None`] instead if the cell is dropped or loses its listeners first.
/// Changes before this call are not observed, even if the future is polled later.
pub fn next_change<T: 'static + Clone>(cell: &Bindable<T>) -> NextChange<T> {
	let (sender, receiver) = oneshot::channel();
	let sender = Cell::new(Some(sender));
	let listener = cell.on_value_changed(move |_, new| {
		if let Some(sender) = sender.take() {
			sender.send(new.clone()).ok();
		}
	});
	NextChange {
		receiver,
		source: cell.downgrade(),
		listener: Some(listener),
	}
}

impl<T: 'static> Future for NextChange<T> {
	type Output = Option<T>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();
		let value = match this.receiver.poll(cx) {
			Poll::Ready(value) => value.ok(),
			Poll::Pending => return Poll::Pending,
		};
		if let (Some(listener), Some(source)) = (this.listener.take(), this.source.upgrade()) {
			source.remove_listener(listener);
		}
		Poll::Ready(value)
	}
}

#[pinned_drop]
impl<T: 'static> PinnedDrop for NextChange<T> {
	fn drop(self: Pin<&mut Self>) {
		let this = self.project();
		if let (Some(listener), Some(source)) = (this.listener.take(), this.source.upgrade()) {
			source.remove_listener(listener);
		}
	}
}

/// A [`Stream`] of a [`Bindable`]'s new values. See [`changes`].
#[pin_project(PinnedDrop)]
#[must_use = "streams do nothing unless polled"]
pub struct Changes<T: 'static> {
	#[pin]
	receiver: mpsc::UnboundedReceiver<T>,
	source: WeakBindable<T>,
	listener: ListenerId,
}

/// Creates a stream of every new value of `cell`, starting now.
///
/// Values are buffered until polled. The stream ends once the cell is dropped or loses its listeners.
pub fn changes<T: 'static + Clone>(cell: &Bindable<T>) -> Changes<T> {
	let (sender, receiver) = mpsc::unbounded();
	let listener = cell.on_value_changed(move |_, new| {
		sender.unbounded_send(new.clone()).ok();
	});
	Changes {
		receiver,
		source: cell.downgrade(),
		listener,
	}
}

impl<T: 'static> Stream for Changes<T> {
	type Item = T;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
		self.project().receiver.poll_next(cx)
	}
}

#[pinned_drop]
impl<T: 'static> PinnedDrop for Changes<T> {
	fn drop(self: Pin<&mut Self>) {
		let this = self.project();
		if let Some(source) = this.source.upgrade() {
			source.remove_listener(*this.listener);
		}
	}
}

/// A [`Stream`] of a [`BindableList`]'s diffs. See [`list_changes`].
#[pin_project(PinnedDrop)]
#[must_use = "streams do nothing unless polled"]
pub struct ListChanges<T: 'static> {
	#[pin]
	receiver: mpsc::UnboundedReceiver<(Vec<T>, ChangeReason)>,
	source: WeakBindableList<T>,
	listener: ListenerId,
}

/// Creates a stream of every diff `list` emits, starting now.
pub fn list_changes<T: 'static + Clone>(list: &BindableList<T>) -> ListChanges<T> {
	let (sender, receiver) = mpsc::unbounded();
	let listener = list.on_list_changed(move |changed, reason| {
		sender.unbounded_send((changed.to_vec(), reason)).ok();
	});
	ListChanges {
		receiver,
		source: list.downgrade(),
		listener,
	}
}

impl<T: 'static> Stream for ListChanges<T> {
	type Item = (Vec<T>, ChangeReason);

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.project().receiver.poll_next(cx)
	}
}

#[pinned_drop]
impl<T: 'static> PinnedDrop for ListChanges<T> {
	fn drop(self: Pin<&mut Self>) {
		let this = self.project();
		if let Some(source) = this.source.upgrade() {
			source.remove_listener(*this.listener);
		}
	}
}

/// Resolves with the first value of `cell` that satisfies `predicate`.
///
/// The current value is checked when the future is first polled. After that, every change is.
/// Resolves with [`None`] if the cell loses its listeners before a value matches.
pub async fn wait_until<T: 'static + Clone>(
	cell: &Bindable<T>,
	mut predicate: impl FnMut(&T) -> bool,
) -> Option<T> {
	let mut changes = changes(cell);
	if let Some(current) = cell.with(|value| predicate(value).then(|| value.clone())) {
		return Some(current);
	}
	while let Some(value) = changes.next().await {
		if predicate(&value) {
			return Some(value);
		}
	}
	None
}
