//! Preferences management

use crate::db::sqlite::models::Preferences;
use crate::error::Result;
use rusqlite::Connection;

/// Get preferences
pub fn get_preferences(conn: &Connection) -> Result<Preferences> {
    let (id, theme, currency, skip, confirm, colors_json): (i64, String, String, i32, i32, String) =
        conn.query_row(
            "SELECT id, theme, currency, skip_duplicates_default, confirm_before_commit, chart_colors
             FROM preferences WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )?;

    Ok(Preferences {
        id,
        theme,
        currency,
        skip_duplicates_default: skip == 1,
        confirm_before_commit: confirm == 1,
        chart_colors: serde_json::from_str(&colors_json)?,
    })
}

/// Update preferences (partial)
pub fn update_preferences(
    conn: &Connection,
    theme: Option<String>,
    currency: Option<String>,
    skip_duplicates_default: Option<bool>,
    confirm_before_commit: Option<bool>,
    chart_colors: Option<Vec<String>>,
) -> Result<Preferences> {
    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(t) = theme {
        updates.push("theme = ?");
        params.push(Box::new(t));
    }
    if let Some(c) = currency {
        updates.push("currency = ?");
        params.push(Box::new(c));
    }
    if let Some(s) = skip_duplicates_default {
        updates.push("skip_duplicates_default = ?");
        params.push(Box::new(s as i32));
    }
    if let Some(c) = confirm_before_commit {
        updates.push("confirm_before_commit = ?");
        params.push(Box::new(c as i32));
    }
    if let Some(colors) = chart_colors {
        updates.push("chart_colors = ?");
        params.push(Box::new(serde_json::to_string(&colors)?));
    }

    if !updates.is_empty() {
        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE preferences SET {} WHERE id = 1", updates.join(", "));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }

    get_preferences(conn)
}
