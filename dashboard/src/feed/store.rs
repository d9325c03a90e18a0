use colored::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lib_ingest::{
    AgentState, AgentStatusData, Batcher, BoundedCache, ChatMessageData, DashboardStore,
    MessageKind, ReportData, ToolCallData,
};

/// Tool call records retained in memory.
const TOOL_CALL_CAPACITY: usize = 200;

/// In-memory dashboard state fed by the ingestion core.
///
/// Agent messages are routed through a `Batcher` so a chatty pipeline renders
/// in batches instead of one terminal write per frame; the retained log is a
/// `BoundedCache` so a long-running session cannot grow without bound.
pub struct FeedStore {
    agents: Mutex<HashMap<String, AgentStatusData>>,
    message_log: Arc<Mutex<BoundedCache<u64, ChatMessageData>>>,
    next_message_id: Arc<AtomicU64>,
    tool_calls: Mutex<BoundedCache<u64, ToolCallData>>,
    next_call_id: AtomicU64,
    reports: Mutex<HashMap<String, ReportData>>,
    connected: AtomicBool,
    reconnecting: AtomicBool,
    last_error: Mutex<Option<String>>,
    batcher: Batcher<ChatMessageData>,
}

impl FeedStore {
    pub fn new(batch_size: usize, batch_interval: Duration, message_log_capacity: usize) -> Self {
        let message_log = Arc::new(Mutex::new(BoundedCache::new(message_log_capacity)));
        let next_message_id = Arc::new(AtomicU64::new(0));

        let log_sink = Arc::clone(&message_log);
        let id_source = Arc::clone(&next_message_id);
        let batcher = Batcher::new(batch_size, batch_interval, move |batch: Vec<ChatMessageData>| {
            let mut log = log_sink.lock().expect("message log lock poisoned");
            for message in batch {
                render_message(&message);
                let id = id_source.fetch_add(1, Ordering::Relaxed);
                log.set(id, message);
            }
        });

        Self {
            agents: Mutex::new(HashMap::new()),
            message_log,
            next_message_id,
            tool_calls: Mutex::new(BoundedCache::new(TOOL_CALL_CAPACITY)),
            next_call_id: AtomicU64::new(0),
            reports: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            last_error: Mutex::new(None),
            batcher,
        }
    }

    /// Flushes any batched messages and releases the batch timer.
    pub fn shutdown(&self) {
        self.batcher.destroy();
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn message_count(&self) -> usize {
        self.message_log.lock().expect("message log lock poisoned").len()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().expect("reports lock poisoned").len()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.lock().expect("agents lock poisoned").len()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("error lock poisoned").clone()
    }
}

impl DashboardStore for FeedStore {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        if connected {
            println!("{}", "── feed connected ──".bright_green());
        } else {
            println!("{}", "── feed disconnected ──".bright_red());
        }
    }

    fn set_reconnecting(&self, reconnecting: bool) {
        self.reconnecting.store(reconnecting, Ordering::Relaxed);
        if reconnecting {
            println!("{}", "── reconnecting... ──".bright_yellow());
        }
    }

    fn update_agent_status(&self, agent_name: &str, status: AgentStatusData) {
        let state_label = match status.status {
            AgentState::Pending => "pending".truecolor(128, 128, 128),
            AgentState::Running => "running".bright_cyan(),
            AgentState::Completed => "completed".bright_green(),
            AgentState::Failed => "failed".bright_red(),
        };
        let progress = status
            .progress
            .map(|p| format!(" {}%", p))
            .unwrap_or_default();
        let task = status
            .current_task
            .as_deref()
            .map(|t| format!(" - {}", t))
            .unwrap_or_default();
        println!("{} {}{}{}", agent_name.bold(), state_label, progress, task);

        let mut agents = self.agents.lock().expect("agents lock poisoned");
        agents.insert(agent_name.to_string(), status);
    }

    fn add_message(&self, message: ChatMessageData) {
        self.batcher.add(message);
    }

    fn add_tool_call(&self, call: ToolCallData) {
        println!(
            "{}",
            format!("[{}] {} -> {}", call.timestamp, call.agent, call.tool_name)
                .truecolor(128, 128, 128)
        );
        let id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let mut calls = self.tool_calls.lock().expect("tool calls lock poisoned");
        calls.set(id, call);
    }

    fn add_report(&self, report: ReportData) {
        println!(
            "{} {}",
            "report:".bold().bright_white(),
            report.section_name.bright_white()
        );
        let mut reports = self.reports.lock().expect("reports lock poisoned");
        reports.insert(report.section_name.clone(), report);
    }

    fn set_error(&self, error: Option<String>) {
        if let Some(message) = &error {
            println!("{}", format!("ERROR: {}", message).bright_white().on_bright_red());
        }
        let mut last = self.last_error.lock().expect("error lock poisoned");
        *last = error;
    }
}

fn render_message(message: &ChatMessageData) {
    let content = match message.message_type {
        MessageKind::Info => message.content.normal(),
        MessageKind::Warning => message.content.bright_yellow(),
        MessageKind::Error => message.content.bright_red(),
        MessageKind::Success => message.content.bright_green(),
    };
    println!(
        "{} {}",
        format!("[{}] {}:", message.timestamp, message.agent).truecolor(128, 128, 128),
        content
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(agent: &str, content: &str) -> ChatMessageData {
        ChatMessageData {
            timestamp: "2026-08-27T10:15:00Z".to_string(),
            agent: agent.to_string(),
            message_type: MessageKind::Info,
            content: content.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_land_in_log_per_batch() {
        let store = FeedStore::new(2, Duration::from_millis(100), 10);

        store.add_message(message("a", "one"));
        assert_eq!(store.message_count(), 0);

        // Second message completes the batch synchronously.
        store.add_message(message("a", "two"));
        assert_eq!(store.message_count(), 2);

        // A straggler is delivered by the interval timer.
        store.add_message(message("a", "three"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.message_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_stragglers() {
        let store = FeedStore::new(10, Duration::from_secs(60), 10);
        store.add_message(message("a", "pending"));
        assert_eq!(store.message_count(), 0);

        store.shutdown();
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_log_is_bounded() {
        let store = FeedStore::new(1, Duration::from_millis(100), 3);
        for i in 0..10 {
            store.add_message(message("a", &format!("m{}", i)));
        }
        assert_eq!(store.message_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_tracks_agents_reports_and_errors() {
        let store = FeedStore::new(10, Duration::from_millis(100), 10);

        store.update_agent_status(
            "Market Analyst",
            AgentStatusData {
                agent_name: "Market Analyst".to_string(),
                status: AgentState::Running,
                progress: Some(50),
                current_task: None,
            },
        );
        assert_eq!(store.agent_count(), 1);

        store.add_report(ReportData {
            section_name: "summary".to_string(),
            content: "# Done".to_string(),
            agent: "Writer".to_string(),
            timestamp: "t".to_string(),
        });
        assert_eq!(store.report_count(), 1);

        store.set_error(Some("boom".to_string()));
        assert_eq!(store.last_error().as_deref(), Some("boom"));
        store.set_error(None);
        assert_eq!(store.last_error(), None);
    }
}
