//! Order repository: persistence and the atomic claim for the `orders` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::order::{ColorMode, FileEntry, Order, OrderId, OrderStatus};

const ORDER_COLUMNS: &str = "id, gateway, total_cost, status, created_at, updated_at";

/// A raw order row from the database.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub gateway: String,
    pub total_cost: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            gateway: row.get("gateway")?,
            total_cost: row.get("total_cost")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn status(&self) -> Result<OrderStatus, DatabaseError> {
        self.status.parse().map_err(|e| DatabaseError::CorruptRow {
            table: "orders",
            reason: format!("order {}: {}", self.id, e),
        })
    }

    fn into_order(self, files: Vec<FileEntry>) -> Result<Order, DatabaseError> {
        let status = self.status()?;
        let total_cost = u64::try_from(self.total_cost).map_err(|_| DatabaseError::CorruptRow {
            table: "orders",
            reason: format!("order {}: negative total cost {}", self.id, self.total_cost),
        })?;
        Ok(Order {
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            updated_at: parse_timestamp(&self.updated_at, &self.id)?,
            id: self.id,
            files,
            gateway: self.gateway,
            total_cost,
            status,
        })
    }
}

/// A raw file row from the database.
#[derive(Debug, Clone)]
struct FileRow {
    file_name: String,
    saved_as: String,
    storage_ref: String,
    page_from: Option<u32>,
    page_to: Option<u32>,
    color: String,
    copies: u32,
    page_count: u32,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            file_name: row.get("file_name")?,
            saved_as: row.get("saved_as")?,
            storage_ref: row.get("storage_ref")?,
            page_from: row.get("page_from")?,
            page_to: row.get("page_to")?,
            color: row.get("color")?,
            copies: row.get("copies")?,
            page_count: row.get("page_count")?,
        })
    }

    fn into_entry(self) -> FileEntry {
        FileEntry {
            file_name: self.file_name,
            saved_as: self.saved_as,
            storage_ref: self.storage_ref,
            from: self.page_from,
            to: self.page_to,
            color: ColorMode::from_wire(&self.color),
            copies: self.copies,
            page_count: self.page_count,
        }
    }
}

/// Outcome of a status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Status the order had right before the write.
    pub previous: OrderStatus,
    /// The order after the write.
    pub order: Order,
}

/// Outcome of a guarded status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedUpdate {
    Updated(StatusChange),
    NotFound,
    /// The order exists but its current status is not a legal predecessor.
    Rejected { current: OrderStatus },
}

/// Query filter parameters for order listing.
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Number of orders in each status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Fixed-width UTC timestamps so lexical order matches time order.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str, order_id: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            table: "orders",
            reason: format!("order {}: bad timestamp '{}': {}", order_id, s, e),
        })
}

fn load_files(conn: &Connection, order_id: &str) -> Result<Vec<FileEntry>, DatabaseError> {
    let mut stmt = conn.prepare_cached(
        "SELECT file_name, saved_as, storage_ref, page_from, page_to, color, copies, page_count
         FROM order_files WHERE order_id = ?1 ORDER BY position ASC",
    )?;
    let files = stmt
        .query_map(params![order_id], FileRow::from_row)?
        .map(|r| r.map(FileRow::into_entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(files)
}

fn hydrate(conn: &Connection, row: OrderRow) -> Result<Order, DatabaseError> {
    let files = load_files(conn, &row.id)?;
    row.into_order(files)
}

fn find_row(conn: &Connection, id: &str) -> Result<Option<OrderRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
            params![id],
            OrderRow::from_row,
        )
        .optional()?;
    Ok(row)
}

fn write_status(
    conn: &Connection,
    id: &str,
    status: OrderStatus,
) -> Result<Option<OrderRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1
                 RETURNING {ORDER_COLUMNS}"
            ),
            params![id, status.as_str(), format_timestamp(Utc::now())],
            OrderRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Inserts an order and all of its files in one transaction.
pub fn insert(db: &Database, order: &Order) -> Result<OrderId, DatabaseError> {
    let total_cost = i64::try_from(order.total_cost).map_err(|_| DatabaseError::CorruptRow {
        table: "orders",
        reason: format!("order {}: total cost {} out of range", order.id, order.total_cost),
    })?;

    db.with_tx(|tx| {
        tx.execute(
            "INSERT INTO orders (id, gateway, total_cost, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                order.id,
                order.gateway,
                total_cost,
                order.status.as_str(),
                format_timestamp(order.created_at),
                format_timestamp(order.updated_at),
            ],
        )?;

        let mut stmt = tx.prepare_cached(
            "INSERT INTO order_files (order_id, position, file_name, saved_as, storage_ref,
             page_from, page_to, color, copies, page_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for (position, file) in order.files.iter().enumerate() {
            stmt.execute(params![
                order.id,
                position as i64,
                file.file_name,
                file.saved_as,
                file.storage_ref,
                file.from,
                file.to,
                file.color.as_str(),
                file.copies,
                file.page_count,
            ])?;
        }
        Ok(order.id.clone())
    })
}

/// Finds an order (with its files) by ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Order>, DatabaseError> {
    db.with_conn(|conn| match find_row(conn, id)? {
        Some(row) => hydrate(conn, row).map(Some),
        None => Ok(None),
    })
}

/// Atomically moves the oldest `pending` order to `processing` and returns it.
///
/// The selection and the status change are a single conditional `UPDATE`, so
/// an order is handed out at most once even when several connections or
/// processes share the database file. Ties on `created_at` fall back to
/// insertion order.
pub fn claim_oldest_pending(db: &Database) -> Result<Option<Order>, DatabaseError> {
    db.with_conn(|conn| {
        let claimed = conn
            .query_row(
                &format!(
                    "UPDATE orders SET status = 'processing', updated_at = ?1
                     WHERE id = (
                         SELECT id FROM orders WHERE status = 'pending'
                         ORDER BY created_at ASC, rowid ASC LIMIT 1
                     )
                     AND status = 'pending'
                     RETURNING {ORDER_COLUMNS}"
                ),
                params![format_timestamp(Utc::now())],
                OrderRow::from_row,
            )
            .optional()?;

        match claimed {
            Some(row) => hydrate(conn, row).map(Some),
            None => Ok(None),
        }
    })
}

/// Sets the status unconditionally. Returns `None` when the order does not exist.
pub fn update_status(
    db: &Database,
    id: &str,
    status: OrderStatus,
) -> Result<Option<StatusChange>, DatabaseError> {
    db.with_tx(|tx| {
        let Some(previous) = find_row(tx, id)? else {
            return Ok(None);
        };
        let previous = previous.status()?;
        match write_status(tx, id, status)? {
            Some(row) => Ok(Some(StatusChange {
                previous,
                order: hydrate(tx, row)?,
            })),
            None => Ok(None),
        }
    })
}

/// Sets the status only when the current status is a legal predecessor of
/// `status`. The write is a compare-and-set on the status read in the same
/// immediate transaction.
pub fn update_status_guarded(
    db: &Database,
    id: &str,
    status: OrderStatus,
) -> Result<GuardedUpdate, DatabaseError> {
    db.with_tx(|tx| {
        let Some(row) = find_row(tx, id)? else {
            return Ok(GuardedUpdate::NotFound);
        };
        let previous = row.status()?;
        if !previous.can_transition_to(status) {
            return Ok(GuardedUpdate::Rejected { current: previous });
        }

        let updated = tx
            .query_row(
                &format!(
                    "UPDATE orders SET status = ?2, updated_at = ?3
                     WHERE id = ?1 AND status = ?4
                     RETURNING {ORDER_COLUMNS}"
                ),
                params![
                    id,
                    status.as_str(),
                    format_timestamp(Utc::now()),
                    previous.as_str()
                ],
                OrderRow::from_row,
            )
            .optional()?;

        match updated {
            Some(row) => Ok(GuardedUpdate::Updated(StatusChange {
                previous,
                order: hydrate(tx, row)?,
            })),
            None => Ok(GuardedUpdate::Rejected { current: previous }),
        }
    })
}

/// Counts orders per status in one pass.
pub fn status_counts(db: &Database) -> Result<StatusCounts, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM orders GROUP BY status")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            match status.parse::<OrderStatus>() {
                Ok(OrderStatus::Pending) => counts.pending = count,
                Ok(OrderStatus::Processing) => counts.processing = count,
                Ok(OrderStatus::Completed) => counts.completed = count,
                Ok(OrderStatus::Failed) => counts.failed = count,
                Err(e) => log::warn!("Skipping {} orders: {}", count, e),
            }
        }
        Ok(counts)
    })
}

/// Queries orders newest first, returning (orders, total_count).
pub fn query(db: &Database, filter: &OrderFilter) -> Result<(Vec<Order>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let status = filter.status.map(|s| s.as_str());
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE (?1 IS NULL OR status = ?1)",
            params![status],
            |r| r.get(0),
        )?;

        let limit = i64::try_from(filter.limit.unwrap_or(100)).unwrap_or(i64::MAX);
        let offset = i64::try_from(filter.offset.unwrap_or(0)).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
            .query_map(params![status, limit, offset], OrderRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let orders = rows
            .into_iter()
            .map(|row| hydrate(conn, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total))
    })
}
