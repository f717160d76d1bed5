//! Line-delimited JSON transport for the disclosure service.
//!
//! Each input line is one [`InboundEvent`]; each output line is an
//! [`OutputLine`]. Every conversation gets a lane: one task that handles its
//! events and its due hides in arrival order and emits their renders, so the
//! output always ends with the render of the conversation's current state.
//! Different conversations proceed concurrently. A lane is retired after a
//! reset; the next lane for that conversation starts once it has finished.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use codegate::{ConversationId, Disclosure, HideDue, InboundEvent, Outbound};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

/// One line written to the output stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputLine {
	Render(Outbound),
	Error { line: usize, message: String },
}

#[derive(Debug)]
enum LaneMessage {
	Event(InboundEvent),
	Hide(HideDue),
}

struct Lane {
	tx: mpsc::UnboundedSender<LaneMessage>,
	task: JoinHandle<()>,
}

/// Per-conversation lanes, plus lanes retired by a reset that may still be draining.
struct Lanes {
	service: Arc<Disclosure>,
	out: mpsc::UnboundedSender<OutputLine>,
	open: HashMap<ConversationId, Lane>,
	retiring: HashMap<ConversationId, JoinHandle<()>>,
}

impl Lanes {
	fn new(service: Arc<Disclosure>, out: mpsc::UnboundedSender<OutputLine>) -> Self {
		Self {
			service,
			out,
			open: HashMap::new(),
			retiring: HashMap::new(),
		}
	}

	fn dispatch_event(&mut self, event: InboundEvent) {
		let conversation_id = event.conversation_id().clone();
		let is_reset = matches!(event, InboundEvent::Reset { .. });
		if self.lane(&conversation_id).tx.send(LaneMessage::Event(event)).is_err() {
			warn!(target = "codegate.serve", conversation = %conversation_id, "lane closed; event dropped");
		}
		if is_reset {
			self.retire(&conversation_id);
		}
	}

	/// Hands a due hide to its conversation's lane. Without a lane the
	/// session was reset, so the hide is stale.
	fn dispatch_hide(&mut self, due: HideDue) {
		match self.open.get(&due.conversation_id) {
			Some(lane) => {
				let conversation_id = due.conversation_id.clone();
				if lane.tx.send(LaneMessage::Hide(due)).is_err() {
					warn!(target = "codegate.serve", conversation = %conversation_id, "lane closed; hide dropped");
				}
			}
			None => debug!(target = "codegate.serve", conversation = %due.conversation_id, "hide for retired lane dropped"),
		}
	}

	fn lane(&mut self, conversation_id: &ConversationId) -> &Lane {
		if !self.open.contains_key(conversation_id) {
			debug!(target = "codegate.serve", conversation = %conversation_id, "lane opened");
			let previous = self.retiring.remove(conversation_id);
			let (tx, rx) = mpsc::unbounded_channel();
			let task = tokio::spawn(run_lane(Arc::clone(&self.service), previous, rx, self.out.clone()));
			self.open.insert(conversation_id.clone(), Lane { tx, task });
		}
		&self.open[conversation_id]
	}

	fn retire(&mut self, conversation_id: &ConversationId) {
		self.retiring.retain(|_, task| !task.is_finished());
		if let Some(lane) = self.open.remove(conversation_id) {
			debug!(target = "codegate.serve", conversation = %conversation_id, "lane retired");
			self.retiring.insert(conversation_id.clone(), lane.task);
		}
	}

	/// Closes every lane and waits for queued messages to be handled.
	async fn drain(self) {
		let tasks = self.open.into_values().map(|lane| lane.task).chain(self.retiring.into_values());
		for task in tasks.collect::<Vec<_>>() {
			if let Err(err) = task.await {
				warn!(target = "codegate.serve", error = %err, "lane worker failed");
			}
		}
	}
}

/// Serves events from `input` until EOF, writing renders to `output`.
///
/// Queued events are still handled after EOF; hides that have not fired by
/// then are dropped.
pub async fn run<R, W>(service: Arc<Disclosure>, mut due_rx: mpsc::UnboundedReceiver<HideDue>, input: R, output: W) -> Result<()>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let (line_tx, line_rx) = mpsc::unbounded_channel::<OutputLine>();
	let writer = tokio::spawn(write_lines(output, line_rx));

	let mut lanes = Lanes::new(service, line_tx.clone());
	let mut reader = BufReader::new(input).lines();
	let mut line_no = 0usize;

	loop {
		tokio::select! {
			line = reader.next_line() => {
				let Some(line) = line.context("failed to read event line")? else {
					break;
				};
				line_no += 1;
				if let Some(event) = parse_line(line_no, &line, &line_tx) {
					lanes.dispatch_event(event);
				}
			}
			Some(due) = due_rx.recv() => lanes.dispatch_hide(due),
		}
	}

	info!(target = "codegate.serve", lines = line_no, conversations = lanes.open.len(), "input closed");
	drop(due_rx);
	lanes.drain().await;
	drop(line_tx);

	writer.await.context("output writer stopped")??;
	Ok(())
}

fn parse_line(line_no: usize, line: &str, errors: &mpsc::UnboundedSender<OutputLine>) -> Option<InboundEvent> {
	if line.trim().is_empty() {
		return None;
	}
	match serde_json::from_str::<InboundEvent>(line) {
		Ok(event) => Some(event),
		Err(err) => {
			warn!(target = "codegate.serve", line = line_no, error = %err, "malformed event");
			let _ = errors.send(OutputLine::Error {
				line: line_no,
				message: err.to_string(),
			});
			None
		}
	}
}

async fn run_lane(
	service: Arc<Disclosure>,
	previous: Option<JoinHandle<()>>,
	mut messages: mpsc::UnboundedReceiver<LaneMessage>,
	out: mpsc::UnboundedSender<OutputLine>,
) {
	if let Some(previous) = previous {
		let _ = previous.await;
	}
	while let Some(message) = messages.recv().await {
		let outbound = match message {
			LaneMessage::Event(event) => {
				let conversation_id = event.conversation_id().clone();
				let render = service.handle(event).await;
				Some(Outbound { conversation_id, render })
			}
			LaneMessage::Hide(due) => service.timer_fired(&due).await.map(|render| Outbound {
				conversation_id: due.conversation_id,
				render,
			}),
		};
		let Some(outbound) = outbound else {
			continue;
		};
		if out.send(OutputLine::Render(outbound)).is_err() {
			break;
		}
	}
}

async fn write_lines<W>(mut output: W, mut lines: mpsc::UnboundedReceiver<OutputLine>) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	while let Some(line) = lines.recv().await {
		let mut encoded = serde_json::to_string(&line)?;
		encoded.push('\n');
		output.write_all(encoded.as_bytes()).await.context("failed to write output line")?;
		output.flush().await.context("failed to flush output")?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use codegate::{DisclosureSettings, LayoutOptions, ManualScheduler, MemorySource, Presentation, Row, SessionState, TableRef, TokioScheduler};
	use serde_json::Value;
	use tokio::io::AsyncReadExt;

	use super::*;

	fn rows() -> Vec<Row> {
		vec![
			Row::from_pairs([("ДОСТУП", "1001"), ("ИНФОРМАЦИЯ", "2-3")]),
			Row::from_pairs([("ID", "2"), ("Адрес", "Pier 2"), ("Код", "2468")]),
			Row::from_pairs([("ID", "3"), ("Адрес", "Pier 3"), ("Код", "1357")]),
		]
	}

	fn settings(hide_after: Duration) -> DisclosureSettings {
		DisclosureSettings {
			table: TableRef::new("teleg-bot-passw", "page1"),
			columns: Default::default(),
			presentation: Presentation {
				layout: LayoutOptions::default(),
				hide_after,
			},
		}
	}

	async fn serve_script(script: &str) -> Vec<Value> {
		let (_scheduler_tx, due_rx) = mpsc::unbounded_channel();
		let service = Arc::new(Disclosure::new(Arc::new(MemorySource::new(rows())), Arc::new(ManualScheduler::new()), settings(Duration::from_secs(60))));
		let (client, server) = tokio::io::duplex(64 * 1024);
		run(service, due_rx, script.as_bytes(), server).await.unwrap();

		let mut client = client;
		let mut out = String::new();
		client.read_to_string(&mut out).await.unwrap();
		out.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
	}

	#[tokio::test]
	async fn events_for_one_conversation_render_in_order() {
		let script = concat!(
			r#"{"type":"open","conversation_id":"c1","user_key":"1001"}"#,
			"\n",
			r#"{"type":"callback","conversation_id":"c1","user_key":"1001","payload":"toggle:3"}"#,
			"\n",
			r#"{"type":"toggle","conversation_id":"c1","user_key":"1001","object_id":"3"}"#,
			"\n",
		);
		let lines = serve_script(script).await;
		assert_eq!(lines.len(), 3);
		assert!(lines.iter().all(|line| line["type"] == "render" && line["conversationId"] == "c1"));
		assert!(!lines[0].to_string().contains("1357"));
		assert!(lines[1]["render"]["bodyText"].as_str().unwrap().contains("1357"));
		assert!(!lines[2].to_string().contains("1357"));
	}

	#[tokio::test]
	async fn malformed_lines_produce_error_lines() {
		let script = "not json\n\n{\"type\":\"open\",\"conversation_id\":\"c2\",\"user_key\":\"1001\"}\n{\"type\":\"launch\"}\n";
		let lines = serve_script(script).await;
		let errors: Vec<_> = lines.iter().filter(|line| line["type"] == "error").collect();
		assert_eq!(errors.len(), 2);
		assert_eq!(errors[0]["line"], 1);
		assert_eq!(errors[1]["line"], 4);
		assert_eq!(lines.iter().filter(|line| line["type"] == "render").count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn timer_hides_are_written_to_the_output() {
		let (scheduler, due_rx) = TokioScheduler::new(Duration::from_secs(5));
		let service = Arc::new(Disclosure::new(Arc::new(MemorySource::new(rows())), Arc::new(scheduler), settings(Duration::from_secs(5))));
		let (input_writer, input_reader) = tokio::io::duplex(4096);
		let (client, server) = tokio::io::duplex(64 * 1024);
		let serving = tokio::spawn(run(service, due_rx, input_reader, server));

		let mut input_writer = input_writer;
		input_writer
			.write_all(b"{\"type\":\"open\",\"conversation_id\":\"c3\",\"user_key\":\"1001\"}\n{\"type\":\"toggle\",\"conversation_id\":\"c3\",\"user_key\":\"1001\",\"object_id\":2}\n")
			.await
			.unwrap();

		let mut reader = BufReader::new(client).lines();
		let opened = reader.next_line().await.unwrap().unwrap();
		let revealed = reader.next_line().await.unwrap().unwrap();
		assert!(!opened.contains("2468"));
		assert!(revealed.contains("2468"));

		tokio::time::sleep(Duration::from_secs(6)).await;
		let hidden = reader.next_line().await.unwrap().unwrap();
		let hidden: Value = serde_json::from_str(&hidden).unwrap();
		assert_eq!(hidden["conversationId"], "c3");
		assert!(!hidden.to_string().contains("2468"));

		drop(input_writer);
		serving.await.unwrap().unwrap();
	}

	fn open_event(conversation: &str) -> InboundEvent {
		InboundEvent::Open {
			conversation_id: ConversationId::from(conversation),
			user_key: "1001".into(),
		}
	}

	#[tokio::test]
	async fn reset_retires_the_lane_and_keeps_order() {
		let service = Arc::new(Disclosure::new(Arc::new(MemorySource::new(rows())), Arc::new(ManualScheduler::new()), settings(Duration::from_secs(60))));
		let (out, mut rendered) = mpsc::unbounded_channel();
		let mut lanes = Lanes::new(Arc::clone(&service), out);

		lanes.dispatch_event(open_event("c5"));
		assert_eq!(lanes.open.len(), 1);

		lanes.dispatch_event(InboundEvent::Reset {
			conversation_id: ConversationId::from("c5"),
		});
		assert!(lanes.open.is_empty());
		assert_eq!(lanes.retiring.len(), 1);

		lanes.dispatch_event(open_event("c5"));
		assert_eq!(lanes.open.len(), 1);
		assert!(lanes.retiring.is_empty());
		lanes.drain().await;

		let mut button_counts = Vec::new();
		while let Some(line) = rendered.recv().await {
			match line {
				OutputLine::Render(outbound) => button_counts.push(outbound.render.buttons().count()),
				OutputLine::Error { .. } => panic!("unexpected error line"),
			}
		}
		assert_eq!(button_counts, vec![3, 0, 3]);

		let handle = service.registry().get(&ConversationId::from("c5")).expect("session after reopen");
		assert_eq!(handle.lock().await.state(), SessionState::Listing);
	}

	#[tokio::test(start_paused = true)]
	async fn reveal_at_the_hide_deadline_is_rendered_last() {
		let (scheduler, due_rx) = TokioScheduler::new(Duration::from_secs(5));
		let service = Arc::new(Disclosure::new(Arc::new(MemorySource::new(rows())), Arc::new(scheduler), settings(Duration::from_secs(5))));
		let (mut input_writer, input_reader) = tokio::io::duplex(4096);
		let (client, server) = tokio::io::duplex(64 * 1024);
		let serving = tokio::spawn(run(Arc::clone(&service), due_rx, input_reader, server));
		let mut reader = BufReader::new(client).lines();

		input_writer
			.write_all(b"{\"type\":\"open\",\"conversation_id\":\"c6\",\"user_key\":\"1001\"}\n{\"type\":\"toggle\",\"conversation_id\":\"c6\",\"user_key\":\"1001\",\"object_id\":2}\n")
			.await
			.unwrap();
		reader.next_line().await.unwrap().unwrap();
		assert!(reader.next_line().await.unwrap().unwrap().contains("2468"));

		tokio::time::sleep(Duration::from_secs(5)).await;
		input_writer
			.write_all(b"{\"type\":\"toggle\",\"conversation_id\":\"c6\",\"user_key\":\"1001\",\"object_id\":3}\n")
			.await
			.unwrap();
		drop(input_writer);
		serving.await.unwrap().unwrap();

		let mut rest = Vec::new();
		while let Some(line) = reader.next_line().await.unwrap() {
			rest.push(line);
		}
		assert!(matches!(rest.len(), 1 | 2), "unexpected output: {rest:?}");
		assert!(rest.iter().all(|line| !line.contains("2468")));
		assert!(rest.last().unwrap().contains("1357"));

		let handle = service.registry().get(&ConversationId::from("c6")).expect("session exists");
		let session = handle.lock().await;
		assert_eq!(session.state(), SessionState::Revealed(3));
		assert!(session.pending_generation().is_some());
	}
}
