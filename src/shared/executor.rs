// This is free and unencumbered software released into the public domain.

//! The single background thread every camera callback runs on.
//!
//! Posted tasks and delivered frames share one FIFO queue, so a session
//! callback and the frames it unlocks are always observed in order. Frames
//! are bounded by a pending counter and dropped when the consumer falls
//! behind; tasks are never dropped.

use crate::shared::{CameraBackend, CameraError, CameraEvent, Frame};
use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicUsize, Ordering},
        mpsc::{Sender, SyncSender, channel},
    },
    thread::JoinHandle,
};

pub type FrameSink = Arc<dyn Fn(Frame) + Send + Sync + 'static>;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub const CAMERA_THREAD_NAME: &str = "CameraBackground";

enum Msg {
    Task(Task),
    Frame(Frame),
    Quit,
}

/// Cloneable handle for posting work onto a running [`BackgroundExecutor`].
#[derive(Clone)]
pub struct Handler {
    tx: Sender<Msg>,
    pending_frames: Arc<AtomicUsize>,
    capacity: usize,
    events_tx: SyncSender<CameraEvent>,
}

impl core::fmt::Debug for Handler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handler")
            .field("pending_frames", &self.pending_frames.load(Ordering::Relaxed))
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Handler {
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> Result<(), CameraError> {
        self.tx
            .send(Msg::Task(Box::new(task)))
            .map_err(|_| CameraError::Closed)
    }

    /// Queues a frame for the sinks. Returns `false` when the frame was dropped.
    pub fn post_frame(&self, backend: CameraBackend, frame: Frame) -> bool {
        let pending = self.pending_frames.fetch_add(1, Ordering::AcqRel);
        if pending >= self.capacity {
            self.pending_frames.fetch_sub(1, Ordering::AcqRel);
            self.report(CameraEvent::FrameDropped { backend });
            return false;
        }
        if self.tx.send(Msg::Frame(frame)).is_err() {
            self.pending_frames.fetch_sub(1, Ordering::AcqRel);
            self.report(CameraEvent::Error {
                backend,
                error: CameraError::Closed,
            });
            return false;
        }
        true
    }

    pub fn report(&self, event: CameraEvent) {
        let _ = self.events_tx.try_send(event);
    }
}

struct Running {
    handler: Handler,
    join: JoinHandle<()>,
}

pub struct BackgroundExecutor {
    name: String,
    capacity: usize,
    sinks: Arc<RwLock<Vec<FrameSink>>>,
    events_tx: SyncSender<CameraEvent>,
    running: Option<Running>,
}

impl BackgroundExecutor {
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        events_tx: SyncSender<CameraEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            sinks: Arc::new(RwLock::new(Vec::new())),
            events_tx,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn handler(&self) -> Option<Handler> {
        self.running.as_ref().map(|r| r.handler.clone())
    }

    pub fn add_sink(&self, sink: FrameSink) {
        if let Ok(mut g) = self.sinks.write() {
            g.push(sink);
        }
    }

    /// Spawns the worker thread. Starting a running executor is a no-op.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.running.is_some() {
            return Ok(());
        }

        let (tx, rx) = channel::<Msg>();
        let pending_frames = Arc::new(AtomicUsize::new(0));
        let sinks = Arc::clone(&self.sinks);
        let pending = Arc::clone(&pending_frames);

        let join = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        Msg::Task(task) => task(),
                        Msg::Frame(frame) => {
                            pending.fetch_sub(1, Ordering::AcqRel);
                            if let Ok(list) = sinks.read() {
                                for s in list.iter() {
                                    (s)(frame.clone());
                                }
                            }
                        },
                        Msg::Quit => break,
                    }
                }
            })
            .map_err(|e| CameraError::driver("spawning the camera thread", e))?;

        tracing::debug!(target: "edge_viewer", thread = %self.name, "background thread started");

        self.running = Some(Running {
            handler: Handler {
                tx,
                pending_frames,
                capacity: self.capacity,
                events_tx: self.events_tx.clone(),
            },
            join,
        });
        Ok(())
    }

    /// Asks the worker to exit once everything already queued has run.
    pub fn quit_safely(&self) {
        if let Some(r) = self.running.as_ref() {
            let _ = r.handler.tx.send(Msg::Quit);
        }
    }

    /// Waits for the worker to exit. Must follow [`Self::quit_safely`].
    pub fn join(&mut self) -> Result<(), CameraError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        drop(running.handler);
        running.join.join().map_err(|_| {
            tracing::error!(
                target: "edge_viewer",
                thread = %self.name,
                "error stopping background thread"
            );
            CameraError::other(format!("{} thread panicked", self.name))
        })?;
        tracing::debug!(target: "edge_viewer", thread = %self.name, "background thread stopped");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), CameraError> {
        self.quit_safely();
        self.join()
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
