use chrono::{Duration, Utc};
use clap::Parser;
use futures_util::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use lib_ingest::{MessageTag, RawFrame};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Soak runner: counts pipeline feed frames per tag", long_about = None)]
struct Args {
    /// Feed endpoint to connect to
    #[clap(short, long, default_value = "ws://127.0.0.1:8765/ws")]
    url: String,

    /// Session id appended to the endpoint path
    #[clap(short, long)]
    session_id: Option<String>,

    /// Report interval in minutes
    #[clap(short, long, default_value_t = 1)]
    report_interval_minutes: u64,
}

struct Stats {
    global_timestamps: VecDeque<chrono::DateTime<Utc>>,
    tag_timestamps: HashMap<String, VecDeque<chrono::DateTime<Utc>>>,
    unparsable: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut url = args.url.clone();
    if let Some(session) = &args.session_id {
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(session);
    }

    let stats = Arc::new(Mutex::new(Stats {
        global_timestamps: VecDeque::new(),
        tag_timestamps: HashMap::new(),
        unparsable: 0,
    }));

    // Clone for the reporter task
    let stats_reporter = Arc::clone(&stats);
    let report_interval_seconds = args.report_interval_minutes * 60;
    tokio::spawn(async move {
        loop {
            sleep(std::time::Duration::from_secs(report_interval_seconds)).await;
            let now = Utc::now();
            let one_minute_ago = now - Duration::minutes(1);

            let mut data = stats_reporter.lock().unwrap();

            // Clean global
            while data.global_timestamps.front().map_or(false, |&t| t < one_minute_ago) {
                data.global_timestamps.pop_front();
            }
            let global_rate = data.global_timestamps.len();

            // Clean per tag and collect rates
            let mut rates: Vec<(String, usize)> = Vec::new();
            for (tag, dq) in data.tag_timestamps.iter_mut() {
                while dq.front().map_or(false, |&t| t < one_minute_ago) {
                    dq.pop_front();
                }
                if !dq.is_empty() {
                    rates.push((tag.clone(), dq.len()));
                }
            }

            // Sort DESC by msg/min
            rates.sort_by(|a, b| b.1.cmp(&a.1));

            let report = rates
                .iter()
                .map(|(t, r)| format!("{}: {} msg/min", t, r))
                .collect::<Vec<_>>()
                .join(", ");

            println!("\n----- 1-Minute Summary -----");
            println!("Global rate: {} msg/min", global_rate);
            println!("Tags: {}", if report.is_empty() { "No data" } else { &report });
            println!("Unparsable frames total: {}", data.unparsable);
            println!("----------------------------\n");
        }
    });

    // Main WebSocket Loop
    println!("Connecting to {}...", url);
    let (ws_stream, _) = connect_async(&url).await.expect("Failed to connect");
    let (_, mut read) = ws_stream.split();
    println!("Connected. Press Ctrl+C to stop.");

    // Handle incoming messages
    while let Some(Ok(msg)) = read.next().await {
        if let Message::Text(text) = msg {
            let now = Utc::now();
            let mut data = stats.lock().unwrap();
            match serde_json::from_str::<RawFrame>(text.as_str()) {
                Ok(frame) => {
                    // Unknown tags are tallied under their wire spelling so a
                    // misbehaving producer shows up in the summary.
                    let tag = MessageTag::parse(&frame.kind)
                        .map(|t| t.as_str().to_string())
                        .unwrap_or(frame.kind);
                    data.global_timestamps.push_back(now);
                    data.tag_timestamps
                        .entry(tag)
                        .or_insert_with(VecDeque::new)
                        .push_back(now);
                }
                Err(_) => data.unparsable += 1,
            }
        }
    }
    println!("Feed closed.");
}
