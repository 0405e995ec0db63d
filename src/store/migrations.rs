pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS searches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location TEXT NOT NULL,
    check_in TEXT,
    check_out TEXT,
    guests INTEGER NOT NULL,
    codes_json TEXT NOT NULL,
    total_results INTEGER NOT NULL,
    best_rate REAL,
    total_savings REAL NOT NULL,
    searched_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_searches_searched_at
    ON searches(searched_at DESC);

CREATE TABLE IF NOT EXISTS offers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_id INTEGER NOT NULL REFERENCES searches(id) ON DELETE CASCADE,
    owner TEXT NOT NULL,
    hotel_name TEXT NOT NULL,
    brand TEXT NOT NULL,
    discount_code TEXT,
    effective_rate REAL,
    savings_amount REAL NOT NULL,
    offer_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_offers_search_rate
    ON offers(search_id, effective_rate);

CREATE TABLE IF NOT EXISTS discount_codes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    corporate_name TEXT NOT NULL,
    code_value TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_discount_codes_corporate
    ON discount_codes(corporate_name COLLATE NOCASE);
"#;
