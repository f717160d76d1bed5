//! Per-conversation disclosure state machine.
//!
//! A session moves between `Closed`, `NoAccess`, `Listing` and
//! `Revealed(id)`. At most one object is revealed at a time, and a revealed
//! object always has exactly one live hide timer tagged with the generation
//! at which it was revealed. Every mutation bumps the generation, so a hide
//! that fires after being superseded finds a mismatching tag and does nothing.
//!
//! Sessions never fetch: callers resolve authorization first, without
//! holding the session lock, then apply the result here.

use codegate_protocol::{Button, ConversationId, ObjectId, RenderInstruction};
use tracing::{debug, info};

use crate::catalog::{EmptyReason, ObjectRecord, Resolution};
use crate::layout::pack;
use crate::timer::{HideDue, HideScheduler, HideTimer};
use crate::view::{self, Presentation};

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	/// Nothing has been shown yet.
	Closed,
	/// The user has no authorization row. Re-enterable on refresh.
	NoAccess,
	/// Authorized, all codes hidden. The object list may be empty.
	Listing,
	/// Authorized, exactly this object's code is visible.
	Revealed(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Closed,
	NoAccess,
	Active,
}

/// Disclosure state for one conversation.
#[derive(Debug)]
pub struct DisclosureSession {
	conversation_id: ConversationId,
	instance: u64,
	phase: Phase,
	objects: Vec<ObjectRecord>,
	empty_reason: Option<EmptyReason>,
	revealed: Option<ObjectId>,
	pending: Option<HideTimer>,
	generation: u64,
}

impl DisclosureSession {
	pub fn new(conversation_id: ConversationId, instance: u64) -> Self {
		Self {
			conversation_id,
			instance,
			phase: Phase::Closed,
			objects: Vec::new(),
			empty_reason: None,
			revealed: None,
			pending: None,
			generation: 0,
		}
	}

	pub fn conversation_id(&self) -> &ConversationId {
		&self.conversation_id
	}

	/// Registry-unique id of this session instance.
	pub fn instance(&self) -> u64 {
		self.instance
	}

	pub fn state(&self) -> SessionState {
		match (self.phase, self.revealed) {
			(Phase::Closed, _) => SessionState::Closed,
			(Phase::NoAccess, _) => SessionState::NoAccess,
			(Phase::Active, Some(id)) => SessionState::Revealed(id),
			(Phase::Active, None) => SessionState::Listing,
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn revealed(&self) -> Option<ObjectId> {
		self.revealed
	}

	/// Authorized objects from the last applied fetch.
	pub fn objects(&self) -> &[ObjectRecord] {
		&self.objects
	}

	/// Generation tag of the pending hide, if one is scheduled.
	pub fn pending_generation(&self) -> Option<u64> {
		self.pending.as_ref().map(HideTimer::generation)
	}

	/// Applies an open or refresh result.
	///
	/// Any revealed code is hidden and its timer cancelled. An unauthorized
	/// result moves the session to `NoAccess`.
	pub fn apply_listing(&mut self, user_key: &str, resolution: Resolution, view: &Presentation) -> RenderInstruction {
		self.cancel_pending();
		self.revealed = None;
		self.advance();

		if !resolution.authorized {
			info!(target = "codegate.session", conversation = %self.conversation_id, "user has no access");
			self.phase = Phase::NoAccess;
			self.objects.clear();
			self.empty_reason = None;
			return RenderInstruction::new(view::no_access(user_key), view::refresh_only());
		}

		self.phase = Phase::Active;
		self.empty_reason = resolution.empty_reason();
		self.objects = resolution.objects;
		debug!(
			target = "codegate.session",
			conversation = %self.conversation_id,
			generation = self.generation,
			objects = self.objects.len(),
			"listing applied"
		);
		self.render(view)
	}

	/// Applies a toggle of `object_id` against a freshly resolved authorization.
	///
	/// A lost authorization or a vanished object falls back to the listing
	/// path with the fresh result. Toggling the revealed object hides it;
	/// toggling any other object reveals it and schedules its hide.
	pub fn apply_toggle(
		&mut self,
		user_key: &str,
		object_id: ObjectId,
		resolution: Resolution,
		scheduler: &dyn HideScheduler,
		view: &Presentation,
	) -> RenderInstruction {
		if !resolution.authorized {
			return self.apply_listing(user_key, resolution, view);
		}
		if resolution.object(object_id).is_none() {
			debug!(target = "codegate.session", conversation = %self.conversation_id, object_id, "toggled object not authorized");
			let mut render = self.apply_listing(user_key, resolution, view);
			render.body_text = format!("{}\n\n{}", view::not_found(object_id), render.body_text);
			return render;
		}

		self.phase = Phase::Active;
		self.empty_reason = None;
		self.objects = resolution.objects;
		self.cancel_pending();

		if self.revealed == Some(object_id) {
			self.revealed = None;
			self.advance();
			debug!(target = "codegate.session", conversation = %self.conversation_id, object_id, generation = self.generation, "code hidden");
		} else {
			self.revealed = Some(object_id);
			let generation = self.advance();
			self.pending = Some(scheduler.schedule(HideDue {
				conversation_id: self.conversation_id.clone(),
				instance: self.instance,
				generation,
			}));
			debug!(target = "codegate.session", conversation = %self.conversation_id, object_id, generation, "code revealed");
		}

		self.render(view)
	}

	/// Handles a fired hide. Returns `None` when the hide is stale.
	///
	/// Authorization is not re-validated; the last applied list is shown.
	pub fn hide_due(&mut self, due: &HideDue, view: &Presentation) -> Option<RenderInstruction> {
		if due.instance != self.instance || due.generation != self.generation || self.revealed.is_none() {
			debug!(
				target = "codegate.session",
				conversation = %self.conversation_id,
				tagged = due.generation,
				current = self.generation,
				"stale hide ignored"
			);
			return None;
		}

		self.pending = None;
		self.revealed = None;
		self.advance();
		debug!(target = "codegate.session", conversation = %self.conversation_id, generation = self.generation, "code auto-hidden");
		Some(self.render(view))
	}

	/// Render for a failed fetch. Leaves the session untouched.
	pub fn unavailable(&self, view: &Presentation) -> RenderInstruction {
		RenderInstruction::new(view::unavailable(), self.buttons(view))
	}

	/// Render for a malformed request. Leaves the session untouched.
	pub fn invalid_request(&self, view: &Presentation) -> RenderInstruction {
		RenderInstruction::new(view::invalid_request(), self.buttons(view))
	}

	/// Cancels any pending hide and returns the session to `Closed`.
	pub fn close(&mut self) {
		self.cancel_pending();
		self.revealed = None;
		self.objects.clear();
		self.empty_reason = None;
		self.phase = Phase::Closed;
		self.advance();
	}

	fn advance(&mut self) -> u64 {
		self.generation += 1;
		self.generation
	}

	fn cancel_pending(&mut self) {
		if let Some(timer) = self.pending.take() {
			timer.cancel();
		}
	}

	fn buttons(&self, view: &Presentation) -> Vec<Vec<Button>> {
		match self.phase {
			Phase::Active => pack(&self.objects, self.revealed, &view.layout),
			Phase::Closed | Phase::NoAccess => view::refresh_only(),
		}
	}

	fn render(&self, view: &Presentation) -> RenderInstruction {
		let body = match self.revealed.and_then(|id| self.objects.iter().find(|object| object.id == id)) {
			Some(object) => view::revealed(object, view.hide_after),
			None => match self.empty_reason {
				Some(reason) => view::empty(reason),
				None => view::listing(self.objects.len()),
			},
		};
		RenderInstruction::new(body, self.buttons(view))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::{Columns, resolve};
	use crate::source::Row;
	use crate::timer::ManualScheduler;

	fn rows(expression: &str) -> Vec<Row> {
		vec![
			Row::from_pairs([("ДОСТУП", "u1"), ("ИНФОРМАЦИЯ", expression)]),
			Row::from_pairs([("ID", "2"), ("Адрес", "addr2"), ("Код", "c2")]),
			Row::from_pairs([("ID", "4"), ("Адрес", "addr4"), ("Код", "c4")]),
			Row::from_pairs([("ID", "5"), ("Адрес", "addr5"), ("Код", "c5")]),
		]
	}

	fn granted(expression: &str) -> Resolution {
		resolve("u1", &rows(expression), &Columns::default())
	}

	fn session() -> DisclosureSession {
		DisclosureSession::new(ConversationId::from("chat"), 1)
	}

	fn labels(render: &RenderInstruction) -> Vec<String> {
		render.buttons().map(|b| b.label.clone()).collect()
	}

	#[test]
	fn new_session_is_closed() {
		let session = session();
		assert_eq!(session.state(), SessionState::Closed);
		assert_eq!(session.generation(), 0);
	}

	#[test]
	fn open_lists_authorized_objects() {
		let mut session = session();
		let render = session.apply_listing("u1", granted("2,4-5"), &Presentation::default());
		assert_eq!(session.state(), SessionState::Listing);
		assert_eq!(session.generation(), 1);
		assert_eq!(labels(&render), vec!["addr2", "addr4", "addr5", "🔄 Refresh codes"]);
	}

	#[test]
	fn unauthorized_open_shows_user_key_without_object_buttons() {
		let mut session = session();
		let render = session.apply_listing("stranger", Resolution::denied(), &Presentation::default());
		assert_eq!(session.state(), SessionState::NoAccess);
		assert!(render.body_text.contains("stranger"));
		assert!(render.buttons().all(|b| b.action_payload == "refresh"));
	}

	#[test]
	fn empty_grant_renders_empty_listing() {
		let mut session = session();
		let render = session.apply_listing("u1", granted(""), &Presentation::default());
		assert_eq!(session.state(), SessionState::Listing);
		assert!(session.objects().is_empty());
		assert_eq!(render.body_text, view::empty(EmptyReason::NoExpression));
	}

	#[test]
	fn toggle_twice_returns_to_listing_without_timer() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);

		let render = session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);
		assert_eq!(session.state(), SessionState::Revealed(4));
		assert!(render.body_text.contains("c4"));
		assert_eq!(session.pending_generation(), Some(session.generation()));
		assert_eq!(scheduler.live().len(), 1);

		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);
		assert_eq!(session.state(), SessionState::Listing);
		assert_eq!(session.pending_generation(), None);
		assert!(scheduler.live().is_empty());
	}

	#[test]
	fn switching_reveal_keeps_exactly_one_live_timer() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);

		session.apply_toggle("u1", 2, granted("2,4-5"), &scheduler, &view);
		let render = session.apply_toggle("u1", 5, granted("2,4-5"), &scheduler, &view);

		assert_eq!(session.state(), SessionState::Revealed(5));
		let live = scheduler.live();
		assert_eq!(live.len(), 1);
		assert_eq!(live[0].generation, session.generation());

		let revealed: Vec<_> = render.buttons().filter(|b| b.label.starts_with('🔑')).collect();
		assert_eq!(revealed.len(), 1);
		assert!(revealed[0].label.contains("c5"));
		assert!(!render.body_text.contains("c2"));
	}

	#[test]
	fn stale_hide_is_a_no_op() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 2, granted("2,4-5"), &scheduler, &view);
		let first = scheduler.scheduled()[0].clone();
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);

		let generation = session.generation();
		assert!(session.hide_due(&first, &view).is_none());
		assert_eq!(session.state(), SessionState::Revealed(4));
		assert_eq!(session.generation(), generation);
	}

	#[test]
	fn current_hide_returns_to_listing() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);

		let fired = scheduler.fire_live();
		assert_eq!(fired.len(), 1);
		let render = session.hide_due(&fired[0], &view).expect("current hide should render");
		assert_eq!(session.state(), SessionState::Listing);
		assert_eq!(session.pending_generation(), None);
		assert!(!render.body_text.contains("c4"));

		assert!(session.hide_due(&fired[0], &view).is_none());
	}

	#[test]
	fn hide_from_another_instance_is_ignored() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);

		let foreign = HideDue {
			conversation_id: ConversationId::from("chat"),
			instance: 99,
			generation: session.generation(),
		};
		assert!(session.hide_due(&foreign, &view).is_none());
		assert_eq!(session.state(), SessionState::Revealed(4));
	}

	#[test]
	fn refresh_cancels_pending_reveal() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);

		session.apply_listing("u1", granted("2,4-5"), &view);
		assert_eq!(session.state(), SessionState::Listing);
		assert!(scheduler.live().is_empty());
	}

	#[test]
	fn toggle_after_losing_access_moves_to_no_access() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);

		let render = session.apply_toggle("u1", 2, Resolution::denied(), &scheduler, &view);
		assert_eq!(session.state(), SessionState::NoAccess);
		assert!(scheduler.live().is_empty());
		assert!(render.body_text.contains("u1"));
	}

	#[test]
	fn toggle_of_revoked_object_renders_not_found_listing() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);

		let render = session.apply_toggle("u1", 5, granted("2,4"), &scheduler, &view);
		assert_eq!(session.state(), SessionState::Listing);
		assert!(render.body_text.starts_with(&view::not_found(5)));
		assert_eq!(session.objects().len(), 2);
		assert!(scheduler.live().is_empty());
	}

	#[test]
	fn unavailable_render_keeps_revealed_state() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);
		let generation = session.generation();

		let render = session.unavailable(&view);
		assert_eq!(render.body_text, view::unavailable());
		assert_eq!(session.state(), SessionState::Revealed(4));
		assert_eq!(session.generation(), generation);
		assert!(render.buttons().any(|b| b.label.contains("c4")));
		assert_eq!(scheduler.live().len(), 1);
	}

	#[test]
	fn close_cancels_and_resets() {
		let scheduler = ManualScheduler::new();
		let view = Presentation::default();
		let mut session = session();
		session.apply_listing("u1", granted("2,4-5"), &view);
		session.apply_toggle("u1", 4, granted("2,4-5"), &scheduler, &view);

		session.close();
		assert_eq!(session.state(), SessionState::Closed);
		assert!(scheduler.live().is_empty());
	}

	#[test]
	fn any_toggle_sequence_leaves_at_most_one_reveal_and_matching_timer() {
		let sequences: &[&[ObjectId]] = &[&[2], &[2, 2], &[2, 4, 5], &[4, 4, 4], &[2, 4, 2, 4, 5, 5], &[5, 2, 5, 9, 4], &[9, 9]];
		for sequence in sequences {
			let scheduler = ManualScheduler::new();
			let view = Presentation::default();
			let mut session = session();
			session.apply_listing("u1", granted("2,4-5"), &view);
			for &id in *sequence {
				session.apply_toggle("u1", id, granted("2,4-5"), &scheduler, &view);
			}

			let live = scheduler.live();
			match session.state() {
				SessionState::Revealed(_) => {
					assert_eq!(live.len(), 1, "sequence {sequence:?}");
					assert_eq!(live[0].generation, session.generation(), "sequence {sequence:?}");
				}
				_ => assert!(live.is_empty(), "sequence {sequence:?}"),
			}
		}
	}
}
