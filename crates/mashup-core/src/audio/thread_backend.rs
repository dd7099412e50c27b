//! Paced render thread
//!
//! Drives the engine in real time without an output device: every block is
//! rendered and discarded, then the thread sleeps until the block's wall
//! clock deadline. The audio clock therefore advances at the nominal sample
//! rate, which is all the beat timeline and the UI need. Used for headless
//! runs and when the `cpal-backend` feature is disabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::engine::{AudioEngine, EngineCommand};
use crate::types::StereoBuffer;

use super::error::{AudioError, AudioResult};

/// Keeps the render thread alive; dropping it stops and joins the thread
pub struct ThreadAudioHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    buffer_size: u32,
}

impl ThreadAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Stop the render thread and wait for it to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Audio thread panicked");
            }
        }
    }
}

impl Drop for ThreadAudioHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(super) fn start(
    mut engine: AudioEngine,
    mut command_rx: rtrb::Consumer<EngineCommand>,
    sample_rate: u32,
    buffer_size: u32,
) -> AudioResult<ThreadAudioHandle> {
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);
    let block = Duration::from_secs_f64(buffer_size as f64 / sample_rate as f64);

    let thread = std::thread::Builder::new()
        .name("mashup-audio".to_string())
        .spawn(move || {
            let mut buffer = StereoBuffer::silence(buffer_size as usize);
            let mut deadline = Instant::now();
            log::info!(
                "Audio thread started: {}Hz, {} frames per block",
                sample_rate,
                buffer_size
            );

            while thread_running.load(Ordering::Relaxed) {
                engine.process_commands(&mut command_rx);
                engine.process(&mut buffer);

                deadline += block;
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                } else if now - deadline > block * 4 {
                    // Fell far behind (suspended process, debugger): resync
                    log::warn!("Audio thread overrun, resyncing");
                    deadline = now;
                }
            }
            log::info!("Audio thread stopped");
        })
        .map_err(|e| AudioError::ThreadSpawnError(e.to_string()))?;

    Ok(ThreadAudioHandle {
        running,
        thread: Some(thread),
        sample_rate,
        buffer_size,
    })
}
