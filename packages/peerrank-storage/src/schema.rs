pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_tags.sql")),
				"tables/002_subjects.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_subjects.sql")),
				"tables/003_offers.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_offers.sql")),
				"tables/004_subject_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_subject_tags.sql")),
				"tables/005_offer_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_offer_tags.sql")),
				"tables/006_jobs_queue.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_jobs_queue.sql")),
				"tables/007_subject_recommended_offers.sql" => out.push_str(include_str!(
					"../../../sql/tables/007_subject_recommended_offers.sql"
				)),
				"tables/008_offer_recommended_subjects.sql" => out.push_str(include_str!(
					"../../../sql/tables/008_offer_recommended_subjects.sql"
				)),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
