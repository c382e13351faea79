//! Per-item image generation
//!
//! Every rendered item owns one slot. A slot's image is generated by a
//! spawned task keyed by [`ItemKey`]; tasks are aborted when the board is
//! cancelled, and anything they report afterwards is ignored.

use crate::ai::{ImageDataUri, ImageGenerationService};
use crate::controller::ItemKey;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "uri", rename_all = "lowercase")]
pub enum ImageSlot {
    Loading,
    Ready(ImageDataUri),
    Failed,
}

/// Result of one image task.
#[derive(Debug)]
pub struct ImageCompletion {
    pub key: ItemKey,
    epoch: u64,
    pub result: Result<ImageDataUri>,
}

/// Delivers one task's completion. If the task unwinds or is aborted first,
/// the slot is reported failed so it never stays loading.
struct CompletionReporter {
    key: ItemKey,
    epoch: u64,
    tx: Option<mpsc::UnboundedSender<ImageCompletion>>,
}

impl CompletionReporter {
    fn send(mut self, result: Result<ImageDataUri>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ImageCompletion {
                key: self.key,
                epoch: self.epoch,
                result,
            });
        }
    }
}

impl Drop for CompletionReporter {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::debug!("Image task for {} ended without a result", self.key);
            let _ = tx.send(ImageCompletion {
                key: self.key,
                epoch: self.epoch,
                result: Err(Error::ImageGeneration(
                    "Image task ended without a result".to_string(),
                )),
            });
        }
    }
}

pub struct ImageBoard {
    service: Arc<dyn ImageGenerationService>,
    slots: HashMap<ItemKey, ImageSlot>,
    tasks: HashMap<ItemKey, JoinHandle<()>>,
    epoch: u64,
    tx: mpsc::UnboundedSender<ImageCompletion>,
    rx: mpsc::UnboundedReceiver<ImageCompletion>,
}

impl ImageBoard {
    pub fn new(service: Arc<dyn ImageGenerationService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            slots: HashMap::new(),
            tasks: HashMap::new(),
            epoch: 0,
            tx,
            rx,
        }
    }

    pub fn slot(&self, key: ItemKey) -> Option<&ImageSlot> {
        self.slots.get(&key)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&ItemKey, &ImageSlot)> {
        self.slots.iter()
    }

    pub fn in_flight(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, ImageSlot::Loading))
            .count()
    }

    /// Start generating the image for `key` unless it is loading or done.
    ///
    /// A failed slot is left alone; use [`ImageBoard::retry`].
    pub fn request(&mut self, key: ItemKey, prompt: &str) -> bool {
        if self.slots.contains_key(&key) {
            return false;
        }
        self.spawn(key, prompt);
        true
    }

    /// Issue a fresh request for a failed slot.
    pub fn retry(&mut self, key: ItemKey, prompt: &str) -> bool {
        if !matches!(self.slots.get(&key), Some(ImageSlot::Failed)) {
            return false;
        }
        tracing::info!("Retrying image for {}", key);
        self.spawn(key, prompt);
        true
    }

    fn spawn(&mut self, key: ItemKey, prompt: &str) {
        let service = Arc::clone(&self.service);
        let reporter = CompletionReporter {
            key,
            epoch: self.epoch,
            tx: Some(self.tx.clone()),
        };
        let prompt = prompt.to_string();

        tracing::debug!("Generating image for {}", key);
        self.slots.insert(key, ImageSlot::Loading);
        let handle = tokio::spawn(async move {
            let result = service.generate_image(&prompt).await;
            reporter.send(result);
        });
        if let Some(previous) = self.tasks.insert(key, handle) {
            previous.abort();
        }
    }

    /// Abort every task and forget every slot.
    pub fn cancel_all(&mut self) {
        let aborted = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        self.slots.clear();
        self.epoch += 1;
        if aborted > 0 {
            tracing::debug!("Cancelled {} image task(s)", aborted);
        }
    }

    /// Record a completion. Returns `false` when it was stale.
    pub fn apply(&mut self, completion: ImageCompletion) -> bool {
        if completion.epoch != self.epoch
            || !matches!(self.slots.get(&completion.key), Some(ImageSlot::Loading))
        {
            tracing::warn!("Dropping stale image result for {}", completion.key);
            return false;
        }

        self.tasks.remove(&completion.key);
        let slot = match completion.result {
            Ok(image) => {
                tracing::debug!("Image ready for {} ({:?})", completion.key, image);
                ImageSlot::Ready(image)
            }
            Err(e) => {
                tracing::error!("Error generating image for {}: {}", completion.key, e);
                ImageSlot::Failed
            }
        };
        self.slots.insert(completion.key, slot);
        true
    }

    /// Wait for the next task to report.
    pub async fn recv(&mut self) -> Option<ImageCompletion> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ImageCompletion> {
        self.rx.try_recv().ok()
    }
}

impl Drop for ImageBoard {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}
