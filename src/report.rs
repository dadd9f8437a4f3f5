//! Console output.
//!
//! Stdout carries the connection listing and one timestamp line per received
//! frame. Diagnostics go to stderr and always name the failing endpoint.

use std::io::{self, Write};

use crate::coordinator::Round;
use crate::error::AcquisitionError;
use crate::manifest::{EndpointDescriptor, Manifest};
use crate::timestamp::{format_local, CaptureTimestamp};

pub fn connection_line(endpoint: &EndpointDescriptor) -> String {
    format!(
        "Port: {}\t PCIC: {}\t Type: {}",
        endpoint.id, endpoint.address, endpoint.kind
    )
}

pub fn timestamp_line(index: usize, timestamp: CaptureTimestamp) -> String {
    format!("Timestamp of frame {:02}: {}", index, format_local(timestamp))
}

pub fn diagnostic_line(err: &AcquisitionError) -> String {
    match err {
        AcquisitionError::Timeout { endpoint_id } => {
            format!("Timeout waiting for camera on {}!", endpoint_id)
        }
        other => format!("error: {}", other),
    }
}

pub struct Reporter<O: Write, E: Write> {
    out: O,
    err: E,
}

impl Reporter<io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Reporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn connections(&mut self, manifest: &Manifest) -> io::Result<()> {
        writeln!(self.out, "Available connections:")?;
        for endpoint in manifest {
            writeln!(self.out, "{}", connection_line(endpoint))?;
        }
        self.out.flush()
    }

    /// Print a round in manifest order. Returns the number of failures.
    pub fn round(&mut self, round: &Round) -> io::Result<usize> {
        let mut failures = 0;
        for (index, result) in round.results().iter().enumerate() {
            match &result.outcome {
                Ok(capture) => {
                    writeln!(self.out, "{}", timestamp_line(index, capture.timestamp))?;
                }
                Err(e) => {
                    failures += 1;
                    self.error(e)?;
                }
            }
        }
        self.out.flush()?;
        Ok(failures)
    }

    pub fn error(&mut self, err: &AcquisitionError) -> io::Result<()> {
        writeln!(self.err, "{}", diagnostic_line(err))?;
        self.err.flush()
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}
