//! Postgres catalog queries backing the inspection tools.

use serde_json::{Value, json};
use sqlx::{PgPool, Row};

/// One inventory row, with stock reported in sellable units.
#[derive(Debug, Clone)]
pub struct InventoryRow {
    pub name: String,
    pub current_stock: Option<f64>,
    pub unit: Option<String>,
    pub weight_per_unit: Option<f64>,
}

/// Look up column metadata for a table from `information_schema`,
/// in catalog (ordinal) order. An unknown table yields an empty list.
pub async fn table_columns(pool: &PgPool, table_name: &str) -> Result<Value, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        select column_name, data_type, is_nullable, column_default
        from information_schema.columns
        where table_name = $1
        order by ordinal_position
        "#,
    )
    .bind(table_name)
    .fetch_all(pool)
    .await?;

    let mut columns = Vec::new();
    for row in rows {
        let column_name: String = row.get("column_name");
        let data_type: String = row.get("data_type");
        let is_nullable: String = row.get("is_nullable");
        let column_default: Option<String> = row.get("column_default");

        columns.push(json!({
            "column_name": column_name,
            "data_type": data_type,
            "is_nullable": is_nullable == "YES",
            "column_default": column_default
        }));
    }

    Ok(Value::Array(columns))
}

/// Look up a stored procedure's source text by name in `pg_proc`.
/// Returns `None` when no function with that name exists.
pub async fn function_definition(
    pool: &PgPool,
    function_name: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        select pg_get_functiondef(p.oid) as definition
        from pg_proc p
        join pg_namespace n on n.oid = p.pronamespace
        where p.proname = $1
          and n.nspname not in ('pg_catalog', 'information_schema')
        limit 1
        "#,
    )
    .bind(function_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get::<String, _>("definition")))
}

/// Fetch inventory rows scoped to one tenant.
///
/// Stock columns are cast to float8 so numeric-typed deployments decode
/// uniformly; `business_id` is compared textually since some schemas
/// store it as uuid and others as text.
pub async fn inventory_for_business(
    pool: &PgPool,
    business_id: &str,
) -> Result<Vec<InventoryRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        select
          name,
          current_stock::float8 as current_stock,
          unit,
          weight_per_unit::float8 as weight_per_unit
        from inventory
        where business_id::text = $1
        order by name
        "#,
    )
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| InventoryRow {
            name: row.get("name"),
            current_stock: row.get("current_stock"),
            unit: row.get("unit"),
            weight_per_unit: row.get("weight_per_unit"),
        })
        .collect())
}
