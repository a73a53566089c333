//! Order and file-entry types shared by intake, the job store and dispatch.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque order identifier (UUID v4 string).
pub type OrderId = String;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }

    /// Statuses an order may legally be in right before moving to `self`.
    pub fn legal_predecessors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[],
            OrderStatus::Processing => &[OrderStatus::Pending],
            OrderStatus::Completed | OrderStatus::Failed => &[OrderStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        next.legal_predecessors().contains(self)
    }

    /// True for `completed` and `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Print color mode of a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Bw,
    Color,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Bw => "bw",
            ColorMode::Color => "color",
        }
    }

    /// Lenient parse used for client metadata: only `color` selects color,
    /// anything else prints black and white.
    pub fn from_wire(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("color") {
            ColorMode::Color
        } else {
            ColorMode::Bw
        }
    }
}

/// One uploaded document within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Name of the file as uploaded by the client.
    pub file_name: String,
    /// Name assigned by the blob store.
    pub saved_as: String,
    /// Opaque reference to the stored binary.
    pub storage_ref: String,
    /// First page to print (1-based), unset prints from the start.
    pub from: Option<u32>,
    /// Last page to print (1-based), unset prints to the end.
    pub to: Option<u32>,
    pub color: ColorMode,
    pub copies: u32,
    /// Detected total page count of the document.
    pub page_count: u32,
}

impl FileEntry {
    /// Printed pages for this entry (range clamped, times copies).
    pub fn printed_pages(&self) -> u64 {
        crate::pricing::printed_pages(self)
    }
}

/// One print job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub files: Vec<FileEntry>,
    pub gateway: String,
    /// Total price in Taka, fixed at creation.
    pub total_cost: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl Order {
    /// Builds a fresh `pending` order stamped with the current time.
    pub fn new_pending(files: Vec<FileEntry>, gateway: String, total_cost: u64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            files,
            gateway,
            total_cost,
            created_at: now,
            updated_at: now,
            status: OrderStatus::Pending,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.files.iter().map(FileEntry::printed_pages).sum()
    }
}
