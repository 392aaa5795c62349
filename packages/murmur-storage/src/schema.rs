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
				"tables/001_workspaces.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_workspaces.sql")),
				"tables/002_channels.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_channels.sql")),
				"tables/003_channel_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_channel_messages.sql")),
				"tables/004_thread_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_thread_messages.sql")),
				"tables/005_direct_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_direct_messages.sql")),
				"tables/006_documents.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_documents.sql")),
				"tables/010_avatar_configs.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_avatar_configs.sql")),
				"tables/011_avatar_chats.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_avatar_chats.sql")),
				"tables/012_avatar_chat_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/012_avatar_chat_messages.sql")),
				"tables/020_message_embeddings.sql" =>
					out.push_str(include_str!("../../../sql/tables/020_message_embeddings.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
