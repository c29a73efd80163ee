// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Deserializer;

use crate::graph::{normalize, DeploymentGraph, RawDeployment};
use crate::observability::messages::controller::{
    SnapshotBufferDiscarded, SnapshotPending, SnapshotRejected,
};
use crate::observability::messages::StructuredLog;

/// Accumulates bytes from the controller stream and decodes them into
/// snapshots.
///
/// The stream carries no framing: a snapshot ends where a JSON document
/// ends. Bytes that do not decode yet stay buffered and count as one failed
/// attempt. Once more than `max_failures` consecutive attempts fail, the
/// buffer is dropped and counting starts over.
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    failures: u32,
    max_failures: u32,
}

impl StreamDecoder {
    pub fn new(max_failures: u32) -> Self {
        Self {
            buffer: Vec::new(),
            failures: 0,
            max_failures,
        }
    }

    /// Append `bytes` and return every snapshot that is now complete, in
    /// stream order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<DeploymentGraph> {
        self.buffer.extend_from_slice(bytes);

        let mut snapshots = Vec::new();
        let mut consumed = 0;
        let mut failed = false;

        let mut documents = Deserializer::from_slice(&self.buffer).into_iter::<RawDeployment>();
        loop {
            match documents.next() {
                None => break,
                Some(Ok(raw)) => {
                    consumed = documents.byte_offset();
                    match normalize(raw) {
                        Ok(graph) => snapshots.push(graph),
                        Err(e) => {
                            SnapshotRejected { error: &e }.log();
                            failed = true;
                        }
                    }
                }
                Some(Err(_)) => {
                    failed = true;
                    break;
                }
            }
        }

        self.buffer.drain(..consumed);
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            self.buffer.clear();
        }

        if !snapshots.is_empty() {
            self.failures = 0;
        } else if failed {
            self.record_failure();
        }
        snapshots
    }

    fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures > self.max_failures {
            SnapshotBufferDiscarded {
                discarded: self.buffer.len(),
                failures: self.failures,
            }
            .log();
            self.buffer.clear();
            self.failures = 0;
        } else {
            SnapshotPending {
                buffered: self.buffer.len(),
                failures: self.failures,
            }
            .log();
        }
    }

    /// Bytes waiting for the rest of their snapshot.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Consecutive failed attempts since the last success or discard.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
