//! The render thread: sole owner of GPU texture lifecycle.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};

use crate::error::OverlayError;
use crate::texture::TextureUploader;
use crate::OverlayResult;

/// Channel capacity for render jobs.
const RENDER_QUEUE_CAPACITY: usize = 16;

/// A unit of work executed on the render thread with the uploader.
pub type RenderJob = Box<dyn FnOnce(&mut dyn TextureUploader) + Send>;

/// Owns the GPU uploader and executes posted jobs in order.
///
/// Texture ids are created and deleted here and nowhere else. Dropping
/// the thread handle drains the queue and joins.
#[derive(Debug)]
pub struct RenderThread {
    job_tx: Sender<RenderJob>,
    thread: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Spawn the render thread around `uploader`.
    pub fn spawn(uploader: Box<dyn TextureUploader>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<RenderJob>(RENDER_QUEUE_CAPACITY);
        let thread = thread::spawn(move || render_loop(uploader, job_rx));
        Self {
            job_tx,
            thread: Some(thread),
        }
    }

    /// Queue a job. Blocks briefly if the queue is full.
    pub fn post(&self, job: RenderJob) -> OverlayResult<()> {
        self.job_tx
            .send(job)
            .map_err(|_| OverlayError::RenderThreadGone)
    }

    /// Wait until every previously posted job has executed.
    pub fn flush(&self) -> OverlayResult<()> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.post(Box::new(move |_| {
            let _ = done_tx.send(());
        }))?;
        done_rx.recv().map_err(|_| OverlayError::RenderThreadGone)
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        // Closing the channel lets the loop drain remaining jobs and exit.
        let (empty_tx, _) = crossbeam_channel::bounded::<RenderJob>(0);
        self.job_tx = empty_tx;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn render_loop(mut uploader: Box<dyn TextureUploader>, job_rx: Receiver<RenderJob>) {
    info!("Render thread running");
    for job in job_rx.iter() {
        job(&mut *uploader);
    }
    debug!("Render thread exiting");
}
