//! Progress reporting for document processing, kept apart from control flow.
//!
//! The session calls an injected [`ProgressObserver`] as each stage starts and
//! for every skipped file; the outcome itself travels in the returned `Result`.

use crate::models::ExtractionWarning;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Extracting,
    Chunking,
    Embedding,
    ChainSetup,
    Complete,
}

impl ProcessingStage {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStage::Extracting => "Extracting text from PDFs...",
            ProcessingStage::Chunking => "Splitting text into chunks...",
            ProcessingStage::Embedding => "Creating vector database...",
            ProcessingStage::ChainSetup => "Initializing AI chain with reranking + extraction...",
            ProcessingStage::Complete => "Processing complete!",
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn stage(&self, stage: ProcessingStage);

    fn warning(&self, _warning: &ExtractionWarning) {}
}

/// Records every event; handy for asserting stage order.
#[derive(Default)]
pub struct RecordingProgress {
    stages: Mutex<Vec<ProcessingStage>>,
    warnings: Mutex<Vec<ExtractionWarning>>,
}

impl RecordingProgress {
    pub fn stages(&self) -> Vec<ProcessingStage> {
        self.stages
            .lock()
            .map(|stages| stages.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<ExtractionWarning> {
        self.warnings
            .lock()
            .map(|warnings| warnings.clone())
            .unwrap_or_default()
    }
}

impl ProgressObserver for RecordingProgress {
    fn stage(&self, stage: ProcessingStage) {
        if let Ok(mut stages) = self.stages.lock() {
            stages.push(stage);
        }
    }

    fn warning(&self, warning: &ExtractionWarning) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(warning.clone());
        }
    }
}
