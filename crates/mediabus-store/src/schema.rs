pub const SCHEMA_VERSION: i32 = 1;

pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS paired_devices (
    device_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    user_agent TEXT NOT NULL,
    last_known_ip TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL,
    last_connected_at_ms INTEGER NOT NULL
);
";
