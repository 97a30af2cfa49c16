use chrono::NaiveTime;
use rusqlite::{params, types::Type, types::Value, OptionalExtension, Row};

use vab_core::domain::{weekday_column, Category, ChatId, Preference, PreferenceUpdate};

use crate::database::Database;
use crate::error::Result;

const TIME_FORMAT: &str = "%H:%M";

/// Weekday columns in `Weekday::num_days_from_sunday()` order, then time and offset.
const COLUMNS: &str =
    "sunday, monday, tuesday, wednesday, thursday, friday, saturday, time, timezone";

fn preference_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<Preference> {
    let mut weekdays = [false; 7];
    for (i, day) in weekdays.iter_mut().enumerate() {
        *day = row.get(first + i)?;
    }
    let time: String = row.get(first + 7)?;
    let delivery_time = NaiveTime::parse_from_str(&time, TIME_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(first + 7, Type::Text, Box::new(e))
    })?;
    Ok(Preference {
        weekdays,
        delivery_time,
        timezone_offset: row.get(first + 8)?,
    })
}

impl Database {
    /// Stored row for (chat, category), if the chat ever changed it.
    pub fn preference(&self, chat: ChatId, category: Category) -> Result<Option<Preference>> {
        let sql = format!("SELECT {COLUMNS} FROM preferences WHERE chat_id = ?1 AND pref_type = ?2");
        let pref = self
            .conn()
            .query_row(&sql, params![chat.0, category.as_str()], |row| {
                preference_from_row(row, 0)
            })
            .optional()?;
        Ok(pref)
    }

    pub fn subscribers(&self, category: Category) -> Result<Vec<(ChatId, Preference)>> {
        let sql = format!(
            "SELECT chat_id, {COLUMNS} FROM preferences WHERE pref_type = ?1 ORDER BY chat_id"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![category.as_str()], |row| {
            Ok((ChatId(row.get(0)?), preference_from_row(row, 1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Upsert one field; the other columns keep their stored or default values.
    pub fn update_preference(
        &self,
        chat: ChatId,
        category: Category,
        update: PreferenceUpdate,
    ) -> Result<()> {
        let (column, value) = match update {
            PreferenceUpdate::Weekday(day, on) => (weekday_column(day), Value::Integer(on as i64)),
            PreferenceUpdate::DeliveryTime(t) => ("time", Value::Text(t.format(TIME_FORMAT).to_string())),
            PreferenceUpdate::Timezone(offset) => ("timezone", Value::Integer(offset as i64)),
        };
        let sql = format!(
            "INSERT INTO preferences (chat_id, pref_type, {column}) VALUES (?1, ?2, ?3)
             ON CONFLICT (chat_id, pref_type) DO UPDATE SET {column} = excluded.{column}"
        );
        self.conn()
            .execute(&sql, params![chat.0, category.as_str(), value])?;
        Ok(())
    }
}
