//! Fixture rows for the read-only side of the schema. Producers own these tables in production.

use peerrank_domain::EntityKind;
use peerrank_storage::{db::Db, models::EdgeInsert, recommendations, vector};

use crate::Result;

struct EntityTable {
	table: &'static str,
	id_column: &'static str,
	text_column: &'static str,
	tag_table: &'static str,
}

fn entity_table(kind: EntityKind) -> EntityTable {
	match kind {
		EntityKind::Subject => EntityTable {
			table: "subjects",
			id_column: "subject_id",
			text_column: "bio",
			tag_table: "subject_tags",
		},
		EntityKind::Offer => EntityTable {
			table: "offers",
			id_column: "offer_id",
			text_column: "description",
			tag_table: "offer_tags",
		},
	}
}

pub async fn tags(db: &Db, tags: &[(i64, &str)]) -> Result<()> {
	for &(tag_id, name) in tags {
		sqlx::query("INSERT INTO tags (tag_id, name) VALUES ($1, $2)")
			.bind(tag_id)
			.bind(name)
			.execute(&db.pool)
			.await?;
	}

	Ok(())
}

/// Inserts a subject or offer, vectorized only when `embedding` is given.
pub async fn entity(
	db: &Db,
	kind: EntityKind,
	entity_id: i64,
	text: Option<&str>,
	embedding: Option<&[f32]>,
) -> Result<()> {
	let EntityTable { table, id_column, text_column, .. } = entity_table(kind);
	let sql = format!(
		"INSERT INTO {table} ({id_column}, {text_column}, embedding) VALUES ($1, $2, $3::text::vector)"
	);

	sqlx::query(&sql)
		.bind(entity_id)
		.bind(text)
		.bind(embedding.map(vector::format_vector_text))
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn tag_entity(db: &Db, kind: EntityKind, entity_id: i64, tag_ids: &[i64]) -> Result<()> {
	let EntityTable { id_column, tag_table, .. } = entity_table(kind);
	let sql = format!(
		"INSERT INTO {tag_table} ({id_column}, tag_id) SELECT $1, unnest($2::bigint[])"
	);

	sqlx::query(&sql).bind(entity_id).bind(tag_ids).execute(&db.pool).await?;

	Ok(())
}

/// Stores an edge set for `source_id`, ranked in the given order.
pub async fn edges(db: &Db, source: EntityKind, source_id: i64, targets: &[(i64, f32)]) -> Result<()> {
	let edges: Vec<EdgeInsert> = targets
		.iter()
		.zip(1_i32..)
		.map(|(&(target_id, score), rank)| EdgeInsert {
			target_id,
			score,
			rank,
			missing_tags: Vec::new(),
		})
		.collect();
	let mut tx = db.pool.begin().await?;

	recommendations::replace_edges_tx(&mut tx, source, source_id, &edges).await?;
	tx.commit().await?;

	Ok(())
}
