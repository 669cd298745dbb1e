//! Background threads with cooperative cancellation.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shared stop flag. Sleeping on it wakes up as soon as it is set.
#[derive(Clone, Default)]
pub struct StopToken {
	inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stop(&self) {
		let (lock, cv) = &*self.inner;
		*lock.lock().expect("stop lock poisoned") = true;
		cv.notify_all();
	}

	pub fn is_stopped(&self) -> bool {
		*self.inner.0.lock().expect("stop lock poisoned")
	}

	/// Sleep for `duration` or until stopped. Returns `true` when stopped.
	pub fn sleep(&self, duration: Duration) -> bool {
		let deadline = Instant::now() + duration;
		let (lock, cv) = &*self.inner;
		let mut stopped = lock.lock().expect("stop lock poisoned");
		while !*stopped {
			let now = Instant::now();
			if now >= deadline {
				break;
			}
			let (guard, _timeout) = cv
				.wait_timeout(stopped, deadline - now)
				.expect("stop lock poisoned during wait");
			stopped = guard;
		}
		*stopped
	}
}

/// A named thread and the token that stops it. Dropping stops and joins.
pub struct Worker {
	name: String,
	token: StopToken,
	handle: Option<JoinHandle<()>>,
}

impl Worker {
	pub fn spawn(name: impl Into<String>, body: impl FnOnce(StopToken) + Send + 'static) -> std::io::Result<Self> {
		let name = name.into();
		let token = StopToken::new();
		let thread_token = token.clone();
		let handle = std::thread::Builder::new().name(name.clone()).spawn(move || body(thread_token))?;
		tracing::debug!(worker = %name, "started");
		Ok(Self { name, token, handle: Some(handle) })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn stop(&self) {
		self.token.stop();
	}

	/// Stop and wait for the thread to finish.
	pub fn join(mut self) {
		self.shutdown();
	}

	fn shutdown(&mut self) {
		self.token.stop();
		if let Some(handle) = self.handle.take() {
			if handle.join().is_err() {
				tracing::error!(worker = %self.name, "worker panicked");
			} else {
				tracing::debug!(worker = %self.name, "stopped");
			}
		}
	}
}

impl Drop for Worker {
	fn drop(&mut self) {
		self.shutdown();
	}
}
