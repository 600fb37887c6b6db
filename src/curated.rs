use std::collections::BTreeMap;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use rusqlite::{Connection, params};

use crate::config::ResolvedConfig;
use crate::domain::{EnvHourlyFact, MacroAnnualFact};
use crate::error::EcoError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS dim_location(
    location_key TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    wikipedia_url TEXT,
    wiki_title TEXT,
    wiki_summary TEXT,
    wiki_fetched_at_utc TEXT
);
CREATE TABLE IF NOT EXISTS dim_region(
    region_code TEXT PRIMARY KEY,
    region_name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_indicator(
    indicator_code TEXT PRIMARY KEY,
    indicator_name TEXT NOT NULL,
    unit TEXT,
    category TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fact_env_hourly(
    location_key TEXT NOT NULL,
    indicator_code TEXT NOT NULL,
    ts_utc TEXT NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY(location_key, indicator_code, ts_utc),
    FOREIGN KEY(location_key) REFERENCES dim_location(location_key),
    FOREIGN KEY(indicator_code) REFERENCES dim_indicator(indicator_code)
);
CREATE TABLE IF NOT EXISTS fact_macro_annual(
    region_code TEXT NOT NULL,
    indicator_code TEXT NOT NULL,
    year INTEGER NOT NULL,
    value REAL,
    PRIMARY KEY(region_code, indicator_code, year),
    FOREIGN KEY(region_code) REFERENCES dim_region(region_code),
    FOREIGN KEY(indicator_code) REFERENCES dim_indicator(indicator_code)
);
CREATE TABLE IF NOT EXISTS fetch_run_log(
    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at_utc TEXT NOT NULL,
    finished_at_utc TEXT,
    ok INTEGER NOT NULL,
    message TEXT
);
CREATE TABLE IF NOT EXISTS source_run_log(
    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_name TEXT NOT NULL,
    started_at_utc TEXT NOT NULL,
    finished_at_utc TEXT,
    ok INTEGER NOT NULL,
    message TEXT,
    item_count INTEGER NOT NULL
);
";

#[derive(Debug, Clone)]
pub struct EnvHourView {
    pub ts_utc: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct RunLogEntry {
    pub started_at_utc: String,
    pub finished_at_utc: Option<String>,
    pub ok: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceRunEntry {
    pub source: String,
    pub started_at_utc: String,
    pub finished_at_utc: Option<String>,
    pub ok: bool,
    pub message: Option<String>,
    pub item_count: usize,
}

#[derive(Debug, Clone)]
pub struct LocationWiki {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub fetched_at_utc: Option<String>,
}

pub struct CuratedStore {
    conn: Mutex<Connection>,
}

impl CuratedStore {
    pub fn open(path: &Utf8Path, config: &ResolvedConfig) -> Result<Self, EcoError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| EcoError::Schema(err.to_string()))?;
        }
        let conn = Connection::open(path.as_std_path())
            .map_err(|err| EcoError::Schema(err.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|err| EcoError::Schema(err.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema(config)?;
        Ok(store)
    }

    pub fn ensure_schema(&self, config: &ResolvedConfig) -> Result<(), EcoError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|err| EcoError::Schema(err.to_string()))?;

        for location in &config.locations {
            conn.execute(
                "INSERT OR IGNORE INTO dim_location(location_key, name, lat, lon, wikipedia_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    location.key.as_str(),
                    location.name,
                    location.lat,
                    location.lon,
                    location.wikipedia_url,
                ],
            )
            .map_err(|err| EcoError::Schema(err.to_string()))?;
        }
        for region in &config.regions {
            conn.execute(
                "INSERT OR IGNORE INTO dim_region(region_code, region_name) VALUES (?1, ?2)",
                params![region.code, region.name],
            )
            .map_err(|err| EcoError::Schema(err.to_string()))?;
        }
        for indicator in config.env_indicators.iter().chain(&config.macro_indicators) {
            conn.execute(
                "INSERT OR IGNORE INTO dim_indicator(indicator_code, indicator_name, unit, category)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    indicator.code,
                    indicator.name,
                    indicator.unit,
                    indicator.category.to_string(),
                ],
            )
            .map_err(|err| EcoError::Schema(err.to_string()))?;
        }
        Ok(())
    }

    pub fn upsert_env_facts(&self, rows: &[EnvHourlyFact]) -> Result<usize, EcoError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql_err)?;
        for row in rows {
            tx.execute(
                "INSERT INTO fact_env_hourly(location_key, indicator_code, ts_utc, value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(location_key, indicator_code, ts_utc)
                 DO UPDATE SET value=excluded.value",
                params![row.location_key.as_str(), row.indicator_code, row.ts_utc, row.value],
            )
            .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(rows.len())
    }

    pub fn upsert_macro_facts(&self, rows: &[MacroAnnualFact]) -> Result<usize, EcoError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql_err)?;
        for row in rows {
            tx.execute(
                "INSERT INTO fact_macro_annual(region_code, indicator_code, year, value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(region_code, indicator_code, year)
                 DO UPDATE SET value=excluded.value",
                params![row.region_code, row.indicator_code, row.year, row.value],
            )
            .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(rows.len())
    }

    pub fn update_location_wiki(
        &self,
        location_key: &str,
        title: &str,
        summary: &str,
        fetched_at_utc: &str,
    ) -> Result<(), EcoError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE dim_location
             SET wiki_title=?2, wiki_summary=?3, wiki_fetched_at_utc=?4
             WHERE location_key=?1",
            params![location_key, title, summary, fetched_at_utc],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    pub fn locations_for_wiki_url(&self, url: &str) -> Result<Vec<String>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT location_key FROM dim_location WHERE wikipedia_url=?1")
            .map_err(sql_err)?;
        let keys = stmt
            .query_map(params![url], |row| row.get(0))
            .map_err(sql_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(sql_err)?;
        Ok(keys)
    }

    pub fn location_wiki(&self, location_key: &str) -> Result<Option<LocationWiki>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT wiki_title, wiki_summary, wiki_fetched_at_utc
                 FROM dim_location WHERE location_key=?1",
            )
            .map_err(sql_err)?;
        let mut rows = stmt
            .query_map(params![location_key], |row| {
                Ok(LocationWiki {
                    title: row.get(0)?,
                    summary: row.get(1)?,
                    fetched_at_utc: row.get(2)?,
                })
            })
            .map_err(sql_err)?;
        rows.next().transpose().map_err(sql_err)
    }

    pub fn latest_env_hours(
        &self,
        location_key: &str,
        limit: usize,
    ) -> Result<Vec<EnvHourView>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ts_utc, indicator_code, value FROM fact_env_hourly
                 WHERE location_key=?1 AND ts_utc IN (
                     SELECT DISTINCT ts_utc FROM fact_env_hourly
                     WHERE location_key=?1 ORDER BY ts_utc DESC LIMIT ?2
                 )",
            )
            .map_err(sql_err)?;
        let facts = stmt
            .query_map(params![location_key, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;

        let mut by_hour: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for (ts_utc, indicator_code, value) in facts {
            by_hour.entry(ts_utc).or_default().insert(indicator_code, value);
        }
        Ok(by_hour
            .into_iter()
            .rev()
            .map(|(ts_utc, values)| EnvHourView { ts_utc, values })
            .collect())
    }

    pub fn latest_env_kpis(&self, location_key: &str) -> Result<Option<EnvHourView>, EcoError> {
        Ok(self.latest_env_hours(location_key, 1)?.into_iter().next())
    }

    pub fn env_series(
        &self,
        location_key: &str,
        indicator_code: &str,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ts_utc, value FROM fact_env_hourly
                 WHERE location_key=?1 AND indicator_code=?2
                 ORDER BY ts_utc DESC LIMIT ?3",
            )
            .map_err(sql_err)?;
        let mut series = stmt
            .query_map(params![location_key, indicator_code, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        series.reverse();
        Ok(series)
    }

    pub fn macro_series(
        &self,
        indicator_code: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<MacroAnnualFact>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT region_code, year, value FROM fact_macro_annual
                 WHERE indicator_code=?1 AND year BETWEEN ?2 AND ?3
                 ORDER BY year ASC, region_code ASC",
            )
            .map_err(sql_err)?;
        let facts = stmt
            .query_map(params![indicator_code, start_year, end_year], |row| {
                Ok(MacroAnnualFact {
                    region_code: row.get(0)?,
                    indicator_code: indicator_code.to_string(),
                    year: row.get(1)?,
                    value: row.get(2)?,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(facts)
    }

    pub fn macro_latest(&self, indicator_code: &str) -> Result<Vec<MacroAnnualFact>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT region_code, MAX(year), value FROM fact_macro_annual
                 WHERE indicator_code=?1 AND value IS NOT NULL
                 GROUP BY region_code ORDER BY region_code ASC",
            )
            .map_err(sql_err)?;
        let facts = stmt
            .query_map(params![indicator_code], |row| {
                Ok(MacroAnnualFact {
                    region_code: row.get(0)?,
                    indicator_code: indicator_code.to_string(),
                    year: row.get(1)?,
                    value: row.get(2)?,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(facts)
    }

    pub fn log_run(
        &self,
        started_at_utc: &str,
        finished_at_utc: &str,
        ok: bool,
        message: &str,
    ) -> Result<(), EcoError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO fetch_run_log(started_at_utc, finished_at_utc, ok, message)
             VALUES (?1, ?2, ?3, ?4)",
            params![started_at_utc, finished_at_utc, ok as i64, message],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    pub fn log_source_run(
        &self,
        source: &str,
        started_at_utc: &str,
        finished_at_utc: &str,
        ok: bool,
        message: &str,
        item_count: usize,
    ) -> Result<(), EcoError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO source_run_log(source_name, started_at_utc, finished_at_utc, ok, message, item_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![source, started_at_utc, finished_at_utc, ok as i64, message, item_count as i64],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunLogEntry>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT started_at_utc, finished_at_utc, ok, message FROM fetch_run_log
                 ORDER BY run_id DESC LIMIT ?1",
            )
            .map_err(sql_err)?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunLogEntry {
                    started_at_utc: row.get(0)?,
                    finished_at_utc: row.get(1)?,
                    ok: row.get::<_, i64>(2)? != 0,
                    message: row.get(3)?,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(entries)
    }

    pub fn recent_source_runs(&self, limit: usize) -> Result<Vec<SourceRunEntry>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT source_name, started_at_utc, finished_at_utc, ok, message, item_count
                 FROM source_run_log ORDER BY run_id DESC LIMIT ?1",
            )
            .map_err(sql_err)?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SourceRunEntry {
                    source: row.get(0)?,
                    started_at_utc: row.get(1)?,
                    finished_at_utc: row.get(2)?,
                    ok: row.get::<_, i64>(3)? != 0,
                    message: row.get(4)?,
                    item_count: row.get::<_, i64>(5)? as usize,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(entries)
    }

    pub fn env_facts(&self, location_key: &str) -> Result<Vec<EnvHourlyFact>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT location_key, indicator_code, ts_utc, value FROM fact_env_hourly
                 WHERE location_key=?1 ORDER BY ts_utc ASC, indicator_code ASC",
            )
            .map_err(sql_err)?;
        let facts = stmt
            .query_map(params![location_key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        facts
            .into_iter()
            .map(|(location_key, indicator_code, ts_utc, value)| {
                Ok(EnvHourlyFact {
                    location_key: location_key
                        .parse()
                        .map_err(|_| EcoError::Sqlite(format!("bad location key: {location_key}")))?,
                    indicator_code,
                    ts_utc,
                    value,
                })
            })
            .collect()
    }

    pub fn macro_facts(&self, indicator_code: &str) -> Result<Vec<MacroAnnualFact>, EcoError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT region_code, year, value FROM fact_macro_annual
                 WHERE indicator_code=?1 ORDER BY region_code ASC, year ASC",
            )
            .map_err(sql_err)?;
        let facts = stmt
            .query_map(params![indicator_code], |row| {
                Ok(MacroAnnualFact {
                    region_code: row.get(0)?,
                    indicator_code: indicator_code.to_string(),
                    year: row.get(1)?,
                    value: row.get(2)?,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(facts)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, EcoError> {
        self.conn
            .lock()
            .map_err(|_| EcoError::Sqlite("curated store lock poisoned".to_string()))
    }
}

fn sql_err(err: rusqlite::Error) -> EcoError {
    EcoError::Sqlite(err.to_string())
}
