//! The item catalog: the authoritative record behind retrieval hits.

use super::Store;
use chrono::NaiveDate;
use giro_core::{error::GiroError, filter::ItemAvailability};

/// One recommendable item (event or venue).
#[derive(Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub url: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Closed flags indexed Monday..Sunday.
    pub closed: [bool; 7],
    pub is_during_day: bool,
    pub is_during_night: bool,
}

impl Item {
    /// The metadata view the compiled query filter evaluates against.
    pub fn availability(&self) -> ItemAvailability {
        ItemAvailability {
            start_date: self.start_date,
            end_date: self.end_date,
            closed: self.closed,
            is_during_day: self.is_during_day,
            is_during_night: self.is_during_night,
        }
    }
}

type ItemRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    bool,
    bool,
    bool,
    bool,
    bool,
    bool,
    bool,
    bool,
    bool,
);

fn parse_date(id: i64, s: &str) -> Result<NaiveDate, GiroError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| GiroError::Memory(format!("item {id} has bad date '{s}': {e}")))
}

fn from_row(row: ItemRow) -> Result<Item, GiroError> {
    let (id, name, description, location, url, start_date, end_date, mon, tue, wed, thu, fri, sat, sun, day, night) =
        row;
    Ok(Item {
        id,
        name,
        description,
        location,
        url,
        start_date: parse_date(id, &start_date)?,
        end_date: parse_date(id, &end_date)?,
        closed: [mon, tue, wed, thu, fri, sat, sun],
        is_during_day: day,
        is_during_night: night,
    })
}

const ITEM_COLUMNS: &str = "id, name, description, location, url, start_date, end_date, \
     is_closed_mon, is_closed_tue, is_closed_wed, is_closed_thu, is_closed_fri, \
     is_closed_sat, is_closed_sun, is_during_day, is_during_night";

impl Store {
    /// Fetch items by id, preserving the requested order.
    ///
    /// Every requested id must exist: a hit returned by the retrieval index
    /// with no catalog row means the index and the catalog have diverged,
    /// and the turn must fail rather than answer with partial data.
    pub async fn get_items(&self, ids: &[i64]) -> Result<Vec<Item>, GiroError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, ItemRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GiroError::Memory(format!("item fetch failed: {e}")))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(from_row(row)?);
        }

        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            match items.iter().find(|i| i.id == *id) {
                Some(item) => ordered.push(item.clone()),
                None => {
                    return Err(GiroError::DataIntegrity(format!(
                        "retrieval hit for item {id} has no catalog row"
                    )))
                }
            }
        }
        Ok(ordered)
    }

    /// Insert or replace one catalog item.
    pub async fn upsert_item(&self, item: &Item) -> Result<(), GiroError> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO items ({ITEM_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.location)
        .bind(&item.url)
        .bind(item.start_date.format("%Y-%m-%d").to_string())
        .bind(item.end_date.format("%Y-%m-%d").to_string())
        .bind(item.closed[0])
        .bind(item.closed[1])
        .bind(item.closed[2])
        .bind(item.closed[3])
        .bind(item.closed[4])
        .bind(item.closed[5])
        .bind(item.closed[6])
        .bind(item.is_during_day)
        .bind(item.is_during_night)
        .execute(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("item upsert failed: {e}")))?;
        Ok(())
    }
}
