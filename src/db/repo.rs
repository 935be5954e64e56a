use super::model::{BatchRecord, NewUser, PacketRecord, ProductRecord, UserRecord};
use crate::model::{compose_serial, packet_suffixes, Role};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{instrument, warn};
use uuid::Uuid;

pub type Pool = SqlitePool;

const USER_COLUMNS: &str = "uid, name, email, phone_number, role, created_at, last_login_at";
const PACKET_COLUMNS: &str = "id, product_id, batch_id, product_no, batch_no, packet_no, serial_no, refractometer_report, reported_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let in_memory = normalized.starts_with("sqlite::memory");
    // Every connection to `sqlite::memory:` is its own database; keep one.
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 8 })
        .connect(&normalized)
        .await
        .with_context(|| format!("failed to open {normalized}"))?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/`, make sure the parent
/// directory exists and ask SQLite to create the file. Other URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(?err, parent = %parent.display(), "could not create database directory");
            }
        }
    }

    let query = match query {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{path}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// True when `err` wraps a UNIQUE constraint failure from SQLite.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

/// True when `err` is a UNIQUE failure naming `column` (`table.column`, as SQLite reports it).
pub fn is_unique_violation_on(err: &anyhow::Error, column: &str) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation() && db.message().contains(column),
        _ => false,
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    let role: String = row.try_get("role")?;
    Ok(UserRecord {
        uid: row.try_get("uid")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        // Unknown roles in the store are treated as customers.
        role: role.parse().unwrap_or_default(),
        created_at: row.try_get("created_at")?,
        last_login_at: row.try_get("last_login_at")?,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: row.try_get("id")?,
        product_no: row.try_get("product_no")?,
        name: row.try_get("name")?,
        details: row.try_get("details")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
    })
}

fn batch_from_row(row: &SqliteRow) -> Result<BatchRecord> {
    Ok(BatchRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        batch_no: row.try_get("batch_no")?,
        created_at: row.try_get("created_at")?,
    })
}

fn packet_from_row(row: &SqliteRow) -> Result<PacketRecord> {
    Ok(PacketRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        batch_id: row.try_get("batch_id")?,
        product_no: row.try_get("product_no")?,
        batch_no: row.try_get("batch_no")?,
        packet_no: row.try_get("packet_no")?,
        serial_no: row.try_get("serial_no")?,
        refractometer_report: row.try_get("refractometer_report")?,
        reported_at: row.try_get("reported_at")?,
    })
}

/// Create the user or merge the given fields into the stored record.
/// Fields left as `None` keep their stored value; a new record gets
/// `name = "User"` and `role = customer`.
#[instrument(skip_all, fields(uid = %user.uid))]
pub async fn upsert_user(pool: &Pool, user: &NewUser<'_>) -> Result<UserRecord> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO users (uid, name, email, phone_number, role, created_at, last_login_at, updated_at) \
         VALUES (?1, COALESCE(?2, 'User'), ?3, ?4, COALESCE(?5, 'customer'), ?6, ?6, ?6) \
         ON CONFLICT(uid) DO UPDATE SET \
           name = COALESCE(?2, users.name), \
           email = COALESCE(?3, users.email), \
           phone_number = COALESCE(?4, users.phone_number), \
           role = COALESCE(?5, users.role), \
           last_login_at = ?6, \
           updated_at = ?6 \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(user.uid)
        .bind(user.name)
        .bind(user.email)
        .bind(user.phone_number)
        .bind(user.role.map(|r| r.as_str()))
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to upsert user")?;
    user_from_row(&row)
}

#[instrument(skip_all, fields(uid = %uid))]
pub async fn get_user(pool: &Pool, uid: &str) -> Result<Option<UserRecord>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?");
    let row = sqlx::query(&sql).bind(uid).fetch_optional(pool).await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Overwrite the role of an existing user. Returns false when `uid` is unknown.
#[instrument(skip_all, fields(uid = %uid, role = %role))]
pub async fn set_user_role(pool: &Pool, uid: &str, role: Role) -> Result<bool> {
    let res = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE uid = ?")
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn insert_product(
    pool: &Pool,
    product_no: &str,
    name: &str,
    details: Option<&str>,
    image_url: Option<&str>,
) -> Result<ProductRecord> {
    let row = sqlx::query(
        "INSERT INTO products (id, product_no, name, details, image_url, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         RETURNING id, product_no, name, details, image_url, created_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_no)
    .bind(name)
    .bind(details)
    .bind(image_url)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    product_from_row(&row)
}

#[instrument(skip_all)]
pub async fn list_products(pool: &Pool) -> Result<Vec<ProductRecord>> {
    let rows = sqlx::query(
        "SELECT id, product_no, name, details, image_url, created_at FROM products ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(product_from_row).collect()
}

#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn get_product(pool: &Pool, product_id: &str) -> Result<Option<ProductRecord>> {
    let row = sqlx::query(
        "SELECT id, product_no, name, details, image_url, created_at FROM products WHERE id = ?",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(product_from_row).transpose()
}

/// Create a batch and `packet_count` packets for it in one transaction.
#[instrument(skip_all, fields(product_id = %product.id, batch_no = %batch_no, packet_count = packet_count))]
pub async fn insert_batch(
    pool: &Pool,
    product: &ProductRecord,
    batch_no: &str,
    packet_count: u32,
) -> Result<(BatchRecord, Vec<PacketRecord>)> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        "INSERT INTO batches (id, product_id, batch_no, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, product_id, batch_no, created_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&product.id)
    .bind(batch_no)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    let batch = batch_from_row(&row)?;

    let sql = format!(
        "INSERT INTO packets (id, product_id, batch_id, product_no, batch_no, packet_no, serial_no, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {PACKET_COLUMNS}"
    );
    let mut packets = Vec::with_capacity(packet_count as usize);
    for suffix in packet_suffixes(packet_count) {
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&product.id)
            .bind(&batch.id)
            .bind(&product.product_no)
            .bind(&batch.batch_no)
            .bind(&suffix)
            .bind(compose_serial(&product.product_no, &batch.batch_no, &suffix))
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        packets.push(packet_from_row(&row)?);
    }
    tx.commit().await?;
    Ok((batch, packets))
}

#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn list_batches(pool: &Pool, product_id: &str) -> Result<Vec<BatchRecord>> {
    let rows = sqlx::query(
        "SELECT id, product_id, batch_no, created_at FROM batches WHERE product_id = ? ORDER BY created_at ASC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(batch_from_row).collect()
}

#[instrument(skip_all, fields(product_id = %product_id, batch_id = %batch_id))]
pub async fn get_batch(pool: &Pool, product_id: &str, batch_id: &str) -> Result<Option<BatchRecord>> {
    let row = sqlx::query(
        "SELECT id, product_id, batch_no, created_at FROM batches WHERE id = ? AND product_id = ?",
    )
    .bind(batch_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(batch_from_row).transpose()
}

#[instrument(skip_all, fields(batch_id = %batch.id, packet_no = %packet_no))]
pub async fn insert_packet(
    pool: &Pool,
    product: &ProductRecord,
    batch: &BatchRecord,
    packet_no: &str,
) -> Result<PacketRecord> {
    let sql = format!(
        "INSERT INTO packets (id, product_id, batch_id, product_no, batch_no, packet_no, serial_no, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {PACKET_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&product.id)
        .bind(&batch.id)
        .bind(&product.product_no)
        .bind(&batch.batch_no)
        .bind(packet_no)
        .bind(compose_serial(&product.product_no, &batch.batch_no, packet_no))
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
    packet_from_row(&row)
}

/// Packets of a batch ordered by suffix; `pending_only` drops those with a report.
#[instrument(skip_all, fields(batch_id = %batch_id, pending_only = pending_only))]
pub async fn list_packets(pool: &Pool, batch_id: &str, pending_only: bool) -> Result<Vec<PacketRecord>> {
    let sql = format!("SELECT {PACKET_COLUMNS} FROM packets WHERE batch_id = ? ORDER BY packet_no ASC");
    let rows = sqlx::query(&sql).bind(batch_id).fetch_all(pool).await?;
    let packets = rows
        .iter()
        .map(packet_from_row)
        .collect::<Result<Vec<_>>>()?;
    Ok(packets
        .into_iter()
        .filter(|p| !pending_only || !p.has_report())
        .collect())
}

#[instrument(skip_all, fields(serial_no = %serial_no))]
pub async fn find_packet_by_serial(pool: &Pool, serial_no: &str) -> Result<Option<PacketRecord>> {
    let sql = format!("SELECT {PACKET_COLUMNS} FROM packets WHERE serial_no = ?");
    let row = sqlx::query(&sql).bind(serial_no).fetch_optional(pool).await?;
    row.as_ref().map(packet_from_row).transpose()
}

/// Store the report only while the packet still has none. Returns the updated
/// packet, or `None` when another writer got there first.
#[instrument(skip_all, fields(packet_id = %packet_id))]
pub async fn set_packet_report(
    pool: &Pool,
    packet_id: &str,
    report: &str,
) -> Result<Option<PacketRecord>> {
    let sql = format!(
        "UPDATE packets SET refractometer_report = ?, reported_at = ? \
         WHERE id = ? AND (refractometer_report IS NULL OR refractometer_report = '') \
         RETURNING {PACKET_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(report)
        .bind(Utc::now())
        .bind(packet_id)
        .fetch_optional(pool)
        .await
        .context("failed to store refractometer report")?;
    row.as_ref().map(packet_from_row).transpose()
}
