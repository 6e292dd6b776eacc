use std::collections::HashMap;

use sqlx::{Postgres, Transaction};

use peerrank_domain::EntityKind;

use crate::{Error, Result, db::Db, models::EntitySource, vector};

pub(crate) struct EntityTables {
	pub(crate) table: &'static str,
	pub(crate) id_column: &'static str,
	pub(crate) text_column: &'static str,
	pub(crate) tag_table: &'static str,
}

pub(crate) fn tables(kind: EntityKind) -> EntityTables {
	match kind {
		EntityKind::Subject => EntityTables {
			table: "subjects",
			id_column: "subject_id",
			text_column: "bio",
			tag_table: "subject_tags",
		},
		EntityKind::Offer => EntityTables {
			table: "offers",
			id_column: "offer_id",
			text_column: "description",
			tag_table: "offer_tags",
		},
	}
}

/// Loads the free text and sorted tag names of one entity, `None` when the id does not exist.
pub async fn fetch_entity_source(
	db: &Db,
	kind: EntityKind,
	entity_id: i64,
) -> Result<Option<EntitySource>> {
	let EntityTables { table, id_column, text_column, tag_table } = tables(kind);
	let sql = format!(
		"\
SELECT
	e.{text_column} AS text,
	COALESCE(
		array_agg(DISTINCT t.name ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL),
		'{{}}'
	) AS tags
FROM {table} e
LEFT JOIN {tag_table} et ON et.{id_column} = e.{id_column}
LEFT JOIN tags t ON t.tag_id = et.tag_id
WHERE e.{id_column} = $1
GROUP BY e.{id_column}, e.{text_column}"
	);
	let source =
		sqlx::query_as::<_, EntitySource>(&sql).bind(entity_id).fetch_optional(&db.pool).await?;

	Ok(source)
}

/// Stores a freshly computed embedding for one entity.
pub async fn update_embedding_tx(
	tx: &mut Transaction<'_, Postgres>,
	kind: EntityKind,
	entity_id: i64,
	vec: &[f32],
) -> Result<()> {
	let EntityTables { table, id_column, .. } = tables(kind);
	let sql = format!(
		"UPDATE {table} SET embedding = $1::text::vector, updated_at = now() WHERE {id_column} = $2"
	);
	let vec_text = vector::format_vector_text(vec);
	let result =
		sqlx::query(&sql).bind(vec_text.as_str()).bind(entity_id).execute(&mut **tx).await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("{} {entity_id}", kind.as_str())));
	}

	Ok(())
}

/// Reads the stored embedding of one entity, `None` while it has never been vectorized.
pub async fn fetch_embedding(db: &Db, kind: EntityKind, entity_id: i64) -> Result<Option<Vec<f32>>> {
	let EntityTables { table, id_column, .. } = tables(kind);
	let sql = format!("SELECT embedding::text FROM {table} WHERE {id_column} = $1");
	let row: Option<(Option<String>,)> =
		sqlx::query_as(&sql).bind(entity_id).fetch_optional(&db.pool).await?;
	let Some((vec_text,)) = row else {
		return Err(Error::NotFound(format!("{} {entity_id}", kind.as_str())));
	};

	vec_text.map(|text| vector::parse_pg_vector(&text)).transpose()
}

/// Tag names per entity id, sorted. Ids without tags are absent from the map.
pub async fn fetch_tag_names_tx(
	tx: &mut Transaction<'_, Postgres>,
	kind: EntityKind,
	entity_ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>> {
	if entity_ids.is_empty() {
		return Ok(HashMap::new());
	}

	let EntityTables { id_column, tag_table, .. } = tables(kind);
	let sql = format!(
		"\
SELECT et.{id_column}, array_agg(DISTINCT t.name ORDER BY t.name)
FROM {tag_table} et
JOIN tags t ON t.tag_id = et.tag_id
WHERE et.{id_column} = ANY($1)
GROUP BY et.{id_column}"
	);
	let rows: Vec<(i64, Vec<String>)> =
		sqlx::query_as(&sql).bind(entity_ids).fetch_all(&mut **tx).await?;

	Ok(rows.into_iter().collect())
}
