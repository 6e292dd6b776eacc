use sqlx::{Postgres, QueryBuilder, Transaction};

use peerrank_domain::{EntityKind, ScoredCandidate};

use crate::{
	Result,
	db::Db,
	entities,
	models::{EdgeInsert, RecommendationEdge},
	vector,
};

struct EdgeTable {
	table: &'static str,
	source_column: &'static str,
	target_column: &'static str,
	has_missing_tags: bool,
}

fn edge_table(source: EntityKind) -> EdgeTable {
	match source {
		EntityKind::Subject => EdgeTable {
			table: "subject_recommended_offers",
			source_column: "subject_id",
			target_column: "offer_id",
			has_missing_tags: false,
		},
		EntityKind::Offer => EdgeTable {
			table: "offer_recommended_subjects",
			source_column: "offer_id",
			target_column: "subject_id",
			has_missing_tags: true,
		},
	}
}

/// Scores every vectorized entity of the population opposite to `source` against `vec`.
pub async fn score_candidates_tx(
	tx: &mut Transaction<'_, Postgres>,
	source: EntityKind,
	vec: &[f32],
) -> Result<Vec<ScoredCandidate>> {
	let entities::EntityTables { table, id_column, .. } = entities::tables(source.opposite());
	let sql = format!(
		"\
SELECT
	{id_column},
	(1 - (embedding <=> $1::text::vector))::real
FROM {table}
WHERE embedding IS NOT NULL"
	);
	let vec_text = vector::format_vector_text(vec);
	let rows: Vec<(i64, Option<f32>)> =
		sqlx::query_as(&sql).bind(vec_text.as_str()).fetch_all(&mut **tx).await?;

	Ok(rows
		.into_iter()
		.map(|(target_id, score)| ScoredCandidate { target_id, score: score.unwrap_or(f32::NAN) })
		.collect())
}

/// Replaces the whole edge set of `source_id` inside the caller's transaction.
///
/// Readers outside the transaction keep seeing the previous set until it commits.
pub async fn replace_edges_tx(
	tx: &mut Transaction<'_, Postgres>,
	source: EntityKind,
	source_id: i64,
	edges: &[EdgeInsert],
) -> Result<()> {
	let EdgeTable { table, source_column, target_column, has_missing_tags } = edge_table(source);
	let delete = format!("DELETE FROM {table} WHERE {source_column} = $1");

	sqlx::query(&delete).bind(source_id).execute(&mut **tx).await?;

	if edges.is_empty() {
		return Ok(());
	}

	let mut builder = if has_missing_tags {
		QueryBuilder::<Postgres>::new(format!(
			"INSERT INTO {table} ({source_column}, {target_column}, score, rank, missing_tags) "
		))
	} else {
		QueryBuilder::<Postgres>::new(format!(
			"INSERT INTO {table} ({source_column}, {target_column}, score, rank) "
		))
	};

	builder.push_values(edges, |mut b, edge| {
		b.push_bind(source_id).push_bind(edge.target_id).push_bind(edge.score).push_bind(edge.rank);

		if has_missing_tags {
			b.push_bind(edge.missing_tags.clone());
		}
	});
	builder.build().execute(&mut **tx).await?;

	Ok(())
}

/// Stored edges of one source in rank order.
pub async fn list_edges(
	db: &Db,
	source: EntityKind,
	source_id: i64,
) -> Result<Vec<RecommendationEdge>> {
	let EdgeTable { table, source_column, target_column, has_missing_tags } = edge_table(source);
	let missing_tags = if has_missing_tags { "missing_tags" } else { "'{}'::text[]" };
	let sql = format!(
		"\
SELECT
	{source_column} AS source_id,
	{target_column} AS target_id,
	score,
	rank,
	{missing_tags} AS missing_tags
FROM {table}
WHERE {source_column} = $1
ORDER BY rank ASC"
	);
	let edges = sqlx::query_as::<_, RecommendationEdge>(&sql)
		.bind(source_id)
		.fetch_all(&db.pool)
		.await?;

	Ok(edges)
}
