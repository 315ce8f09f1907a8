//! In-memory transport shared by the runtime tests

#![allow(dead_code)]

use beacon_core::{
    AttemptId, Connector, OpenRequest, SessionOptions, TransportError, TransportEvent,
    TransportLink,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Wire {
    pub requests: Vec<OpenRequest>,
    pub frames: Vec<(AttemptId, String)>,
    pub closes: Vec<(AttemptId, u16, String)>,
}

/// Connector recording every open, frame and close
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pub wire: Arc<Mutex<Wire>>,
}

struct MemoryLink {
    attempt: AttemptId,
    wire: Arc<Mutex<Wire>>,
}

impl Connector for MemoryConnector {
    fn open(&mut self, request: OpenRequest) -> Result<Box<dyn TransportLink>, TransportError> {
        let attempt = request.attempt;
        self.wire.lock().unwrap().requests.push(request);
        Ok(Box::new(MemoryLink {
            attempt,
            wire: Arc::clone(&self.wire),
        }))
    }
}

impl TransportLink for MemoryLink {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        self.wire.lock().unwrap().frames.push((self.attempt, frame));
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        self.wire
            .lock()
            .unwrap()
            .closes
            .push((self.attempt, code, reason.to_string()));
    }
}

impl MemoryConnector {
    pub fn request_count(&self) -> usize {
        self.wire.lock().unwrap().requests.len()
    }

    pub fn latest(&self) -> OpenRequest {
        self.wire
            .lock()
            .unwrap()
            .requests
            .last()
            .cloned()
            .expect("no transport was opened")
    }

    /// Report `event` on the most recent attempt
    pub fn report(&self, event: TransportEvent) {
        self.latest().report(event);
    }

    pub fn sent(&self) -> Vec<Value> {
        self.wire
            .lock()
            .unwrap()
            .frames
            .iter()
            .map(|(_, frame)| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.wire.lock().unwrap().closes.len()
    }

    /// Wait until `count` transports have been requested
    pub async fn wait_for_requests(&self, count: usize) {
        for _ in 0..1_000 {
            if self.request_count() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {} transport requests, saw {}",
            count,
            self.request_count()
        );
    }
}

pub fn create_test_options() -> SessionOptions {
    SessionOptions::new("wss://host/ws")
        .with_token("t1")
        .with_client_id("client-runtime")
}

/// Let spawned tasks run without advancing paused time
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
