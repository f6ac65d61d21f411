//! Device event classification.
//!
//! The bandwidth counter only looks at memory operations, split by transfer
//! direction. Classification is made on event names and can be swapped by
//! implementing `KernelClassifier`.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KernelType {
    Computation,
    Communication,
    Memory,
}

/// Memory operation channel.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone, Copy, Hash)]
pub enum MemoryKind {
    #[serde(rename = "Memcpy DtoD")]
    MemcpyDtoD,
    #[serde(rename = "Memcpy DtoH")]
    MemcpyDtoH,
    #[serde(rename = "Memcpy HtoD")]
    MemcpyHtoD,
    #[serde(rename = "Memset")]
    Memset,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::MemcpyDtoD => "Memcpy DtoD",
            MemoryKind::MemcpyDtoH => "Memcpy DtoH",
            MemoryKind::MemcpyHtoD => "Memcpy HtoD",
            MemoryKind::Memset => "Memset",
        }
    }
}

impl Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies device events from their name.
pub trait KernelClassifier {
    fn kernel_type(&self, name: &str) -> KernelType;

    /// Returns the channel of a memory operation, `None` if the operation
    /// does not belong to any tracked channel.
    fn memory_kind(&self, name: &str) -> Option<MemoryKind>;
}

/// Classifier for CUDA/Kineto event names.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelNameClassifier;

impl KernelClassifier for KernelNameClassifier {
    fn kernel_type(&self, name: &str) -> KernelType {
        if name.starts_with("ncclKernel") || name.starts_with("ncclDevKernel") {
            KernelType::Communication
        } else if name.starts_with("Memcpy") || name.starts_with("Memset") {
            KernelType::Memory
        } else {
            KernelType::Computation
        }
    }

    fn memory_kind(&self, name: &str) -> Option<MemoryKind> {
        if name.starts_with("Memset") {
            return Some(MemoryKind::Memset);
        }

        let direction = name.strip_prefix("Memcpy")?.split_whitespace().next()?;

        match direction {
            "HtoD" => Some(MemoryKind::MemcpyHtoD),
            "DtoH" => Some(MemoryKind::MemcpyDtoH),
            "DtoD" => Some(MemoryKind::MemcpyDtoD),
            _ => None,
        }
    }
}
