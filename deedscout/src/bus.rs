//! In-process publish/subscribe.
//!
//! Every worker talks to the rest of the application only through this bus.
//! A subscriber either owns a thread and drains an mpsc queue
//! ([`EventBus::subscribe`]) or registers a callback that runs on the
//! publisher's thread ([`EventBus::on`]).

use std::sync::{
	mpsc::{channel, Receiver, Sender},
	Arc, Mutex,
};

use data::{Deed, SceneRect, ScenePoint};

use crate::lifecycle::MarkerView;

#[derive(Debug, Clone)]
pub enum Event {
	/// A deed panel was read and parsed.
	DeedFound(Deed),
	DeedMarkerAdded(MarkerView),
	DeedMarkerUpdated(MarkerView),
	DeedMarkerRemoved { id: String },
	DeedMarkerTick { id: String, remaining_seconds: u64 },
	/// Raw coordinates read from the compass.
	PlayerPositionParsed { lon: i32, lat: i32 },
	PlayerPositionChanged { point: ScenePoint, rect: SceneRect },
	/// Text of a System channel line from the chat log.
	SystemMessage(String),
	ResourceDepleted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
	DeedFound,
	DeedMarkerAdded,
	DeedMarkerUpdated,
	DeedMarkerRemoved,
	DeedMarkerTick,
	PlayerPositionParsed,
	PlayerPositionChanged,
	SystemMessage,
	ResourceDepleted,
}

impl Topic {
	pub const ALL: [Topic; 9] = [
		Topic::DeedFound,
		Topic::DeedMarkerAdded,
		Topic::DeedMarkerUpdated,
		Topic::DeedMarkerRemoved,
		Topic::DeedMarkerTick,
		Topic::PlayerPositionParsed,
		Topic::PlayerPositionChanged,
		Topic::SystemMessage,
		Topic::ResourceDepleted,
	];
}

impl Event {
	pub fn topic(&self) -> Topic {
		match self {
			Event::DeedFound(_) => Topic::DeedFound,
			Event::DeedMarkerAdded(_) => Topic::DeedMarkerAdded,
			Event::DeedMarkerUpdated(_) => Topic::DeedMarkerUpdated,
			Event::DeedMarkerRemoved { .. } => Topic::DeedMarkerRemoved,
			Event::DeedMarkerTick { .. } => Topic::DeedMarkerTick,
			Event::PlayerPositionParsed { .. } => Topic::PlayerPositionParsed,
			Event::PlayerPositionChanged { .. } => Topic::PlayerPositionChanged,
			Event::SystemMessage(_) => Topic::SystemMessage,
			Event::ResourceDepleted(_) => Topic::ResourceDepleted,
		}
	}
}

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
enum Delivery {
	Queue(Sender<Event>),
	Callback(Callback),
}

#[derive(Clone)]
struct Subscriber {
	id: u64,
	topics: Vec<Topic>,
	delivery: Delivery,
}

#[derive(Default)]
struct Subscribers {
	next_id: u64,
	list: Vec<Subscriber>,
}

#[derive(Clone, Default)]
pub struct EventBus {
	subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	fn add(&self, topics: &[Topic], delivery: Delivery) {
		let mut subs = self.subscribers.lock().expect("subscribers lock poisoned");
		let id = subs.next_id;
		subs.next_id += 1;
		subs.list.push(Subscriber { id, topics: topics.to_vec(), delivery });
	}

	/// Queued delivery of `topics`. Dropping the receiver unsubscribes.
	pub fn subscribe(&self, topics: &[Topic]) -> Receiver<Event> {
		let (tx, rx) = channel();
		self.add(topics, Delivery::Queue(tx));
		rx
	}

	/// Synchronous delivery of `topics` on the publisher's thread.
	pub fn on(&self, topics: &[Topic], callback: impl Fn(&Event) + Send + Sync + 'static) {
		self.add(topics, Delivery::Callback(Arc::new(callback)));
	}

	pub fn publish(&self, event: Event) {
		let topic = event.topic();

		// Snapshot so delivery can't block the subscriber lock.
		let targets: Vec<Subscriber> = {
			let subs = self.subscribers.lock().expect("subscribers lock poisoned");
			subs.list.iter().filter(|s| s.topics.contains(&topic)).cloned().collect()
		};

		let mut dead = Vec::new();
		for sub in targets {
			match sub.delivery {
				Delivery::Queue(tx) => {
					if tx.send(event.clone()).is_err() {
						dead.push(sub.id);
					}
				}
				Delivery::Callback(callback) => callback(&event),
			}
		}

		if !dead.is_empty() {
			tracing::debug!(count = dead.len(), "pruning dropped subscribers");
			let mut subs = self.subscribers.lock().expect("subscribers lock poisoned");
			subs.list.retain(|s| !dead.contains(&s.id));
		}
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.lock().expect("subscribers lock poisoned").list.len()
	}
}
