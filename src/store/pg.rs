//! PostgreSQL store.
//!
//! Rows are fetched with `row_to_json`, partial updates go through
//! `json_populate_record`, and the change stream is carried by
//! `LISTEN/NOTIFY`:
//! - every table that should be live needs the notify trigger, installed with
//!   [`PgStore::install_notify_trigger`] (`rowdeck --install-trigger <table>`)
//! - the trigger publishes `{"action": TG_OP, "record": row}` on the channel
//!   `rowdeck_<table>`
//! - each subscription runs a listener thread with its own connection
//!
//! Operator sign-in is checked by opening a connection as that role; the
//! session token is an HS256 JWT so it can be validated again after restart
//! without keeping the password around. Data access uses the configured
//! service connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use postgres::fallible_iterator::FallibleIterator;
use postgres::{Client, NoTls};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{Credentials, LiveHandle, LiveStream, SessionToken, Store, StoreError};
use crate::model::{ChangeAction, ChangeEvent, CloseReason, RecordId, Row};

/// How long a listener waits for a notification before re-checking its stop flag.
const LISTEN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lifetime of issued session tokens.
const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Prefix of the notification channel of a table.
const CHANNEL_PREFIX: &str = "rowdeck_";

/// Connection settings for [`PgStore`].
#[derive(Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    /// Service role used for data access.
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub tls: bool,
    /// Key used to sign session tokens.
    pub session_secret: Option<String>,
}

impl PgConfig {
    /// Reads settings from the standard environment variables:
    /// - PGHOST (default: localhost)
    /// - PGPORT (default: 5432)
    /// - PGUSER (default: $USER, then postgres)
    /// - PGPASSWORD (default: empty)
    /// - PGDATABASE (default: same as PGUSER)
    pub fn from_env() -> Self {
        let user = std::env::var("PGUSER")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| "postgres".to_string());
        let host = std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("PGPORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432);
        let password = std::env::var("PGPASSWORD").ok().filter(|p| !p.is_empty());
        let database = std::env::var("PGDATABASE").unwrap_or_else(|_| user.clone());

        Self {
            host,
            port,
            user,
            password,
            database,
            tls: false,
            session_secret: None,
        }
    }

    fn connection_string(&self, user: &str, password: Option<&str>) -> String {
        let mut s = format!(
            "host={} port={} user={} dbname={}",
            self.host, self.port, user, self.database
        );
        if let Some(password) = password {
            s.push_str(&format!(" password={}", password));
        }
        s
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// PostgreSQL implementation of [`Store`].
pub struct PgStore {
    config: PgConfig,
    session_secret: String,
    client: Mutex<Option<Client>>,
    listeners: Mutex<HashMap<u64, Arc<AtomicBool>>>,
    next_handle: AtomicU64,
}

impl PgStore {
    /// Creates a store. The service connection is opened lazily.
    pub fn new(config: PgConfig) -> Self {
        let session_secret = match &config.session_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("no session secret configured; sessions will not survive a restart");
                format!(
                    "rowdeck-{}-{}",
                    std::process::id(),
                    Utc::now().timestamp_nanos_opt().unwrap_or_default()
                )
            }
        };
        Self {
            config,
            session_secret,
            client: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
        }
    }

    fn connect(&self, user: &str, password: Option<&str>) -> Result<Client, StoreError> {
        let conn_str = self.config.connection_string(user, password);
        let result = if self.config.tls {
            let connector = native_tls::TlsConnector::new()
                .map_err(|e| StoreError::Connection(format!("TLS setup failed: {}", e)))?;
            Client::connect(&conn_str, postgres_native_tls::MakeTlsConnector::new(connector))
        } else {
            Client::connect(&conn_str, NoTls)
        };
        result.map_err(|e| StoreError::Connection(e.to_string()))
    }

    fn connect_service(&self) -> Result<Client, StoreError> {
        self.connect(&self.config.user, self.config.password.as_deref())
    }

    /// Runs `f` on the service connection, (re)connecting if needed.
    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Client) -> Result<T, postgres::Error>,
    ) -> Result<T, StoreError> {
        let mut guard = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_none_or(|c| c.is_closed()) {
            *guard = Some(self.connect_service()?);
            debug!(host = %self.config.host, db = %self.config.database, "connected");
        }
        let Some(client) = guard.as_mut() else {
            return Err(StoreError::Closed);
        };
        let result = f(client);
        if client.is_closed() {
            *guard = None;
        }
        result.map_err(|e| StoreError::Query(e.to_string()))
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<u64, Arc<AtomicBool>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Installs (or replaces) the trigger that publishes row changes of
    /// `table` on its notification channel.
    pub fn install_notify_trigger(&self, table: &str) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE OR REPLACE FUNCTION rowdeck_notify() RETURNS trigger AS $$
             BEGIN
                 PERFORM pg_notify(
                     '{prefix}' || TG_TABLE_NAME,
                     json_build_object(
                         'action', TG_OP,
                         'record', CASE WHEN TG_OP = 'DELETE' THEN row_to_json(OLD) ELSE row_to_json(NEW) END
                     )::text
                 );
                 RETURN NULL;
             END;
             $$ LANGUAGE plpgsql;
             DROP TRIGGER IF EXISTS rowdeck_notify ON {table};
             CREATE TRIGGER rowdeck_notify AFTER INSERT OR UPDATE OR DELETE ON {table}
                 FOR EACH ROW EXECUTE FUNCTION rowdeck_notify();",
            prefix = CHANNEL_PREFIX,
            table = quote_ident(table),
        );
        self.with_client(|c| c.batch_execute(&sql))?;
        info!(table, "notify trigger installed");
        Ok(())
    }
}

/// Quotes an SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn channel_name(table: &str) -> String {
    format!("{}{}", CHANNEL_PREFIX, table)
}

/// Decodes a trigger payload into a change event.
fn decode_notification(table: &str, payload: &str) -> Option<ChangeEvent> {
    let mut value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(table, error = %e, "undecodable notification payload");
            return None;
        }
    };
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .and_then(ChangeAction::parse)?;
    let row = value
        .get_mut("record")
        .map(Value::take)
        .and_then(|record| Row::from_record(table, record));
    Some(ChangeEvent { action, row })
}

/// Forwards notifications until stopped or the connection drops.
fn listen_loop(mut client: Client, table: String, stop: Arc<AtomicBool>, tx: Sender<ChangeEvent>) {
    loop {
        if stop.load(Ordering::Acquire) {
            let _ = client.batch_execute("UNLISTEN *");
            let _ = tx.send(ChangeEvent::close(CloseReason::Killed));
            debug!(table = %table, "listener stopped");
            return;
        }

        let mut notifications = client.notifications();
        let mut iter = notifications.timeout_iter(LISTEN_POLL_INTERVAL);
        loop {
            match iter.next() {
                Ok(Some(n)) => {
                    let Some(event) = decode_notification(&table, n.payload()) else {
                        continue;
                    };
                    if tx.send(event).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(table = %table, error = %e, "listener connection lost");
                    let _ = tx.send(ChangeEvent::close(CloseReason::Disconnected));
                    return;
                }
            }
        }
    }
}

impl Store for PgStore {
    fn signin(&self, credentials: &Credentials) -> Result<SessionToken, StoreError> {
        let client = self
            .connect(&credentials.username, Some(&credentials.password))
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        drop(client);

        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: credentials.username.clone(),
            iat: now,
            exp: now + SESSION_TTL.as_secs() as i64,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.session_secret.as_bytes()),
        )
        .map_err(|e| StoreError::Auth(e.to_string()))?;
        info!(user = %credentials.username, "signed in");
        Ok(SessionToken(token))
    }

    fn authenticate(&self, token: &SessionToken) -> Result<(), StoreError> {
        let data = jsonwebtoken::decode::<SessionClaims>(
            token.as_str(),
            &DecodingKey::from_secret(self.session_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| StoreError::Auth(e.to_string()))?;
        debug!(user = %data.claims.sub, "session restored");
        Ok(())
    }

    fn tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = self.with_client(|c| {
            c.query(
                "SELECT table_name::text FROM information_schema.tables
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[],
            )
        })?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn select(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let sql = format!("SELECT row_to_json(t)::text FROM {} t", quote_ident(table));
        let rows = self.with_client(|c| c.query(&sql, &[]))?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            let text: String = r.try_get(0).map_err(|e| StoreError::Decode(e.to_string()))?;
            let value: Value =
                serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;
            match Row::from_record(table, value) {
                Some(row) => out.push(row),
                None => warn!(table, "skipping row without id"),
            }
        }
        Ok(out)
    }

    fn live(&self, table: &str) -> Result<LiveStream, StoreError> {
        let mut client = self.connect_service()?;
        client
            .batch_execute(&format!("LISTEN {}", quote_ident(&channel_name(table))))
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let thread_stop = stop.clone();
        let thread_table = table.to_string();
        thread::Builder::new()
            .name(format!("rowdeck-live-{}", handle))
            .spawn(move || listen_loop(client, thread_table, thread_stop, tx))
            .map_err(|e| StoreError::Connection(format!("cannot spawn listener: {}", e)))?;

        self.listeners().insert(handle, stop);
        debug!(handle, table, "listening");
        Ok(LiveStream {
            handle: LiveHandle(handle),
            events: rx,
        })
    }

    fn kill(&self, handle: LiveHandle) -> Result<(), StoreError> {
        if let Some(stop) = self.listeners().remove(&handle.0) {
            stop.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn merge(&self, id: &RecordId, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let columns: Vec<&String> = fields.keys().filter(|k| k.as_str() != "id").collect();
        if columns.is_empty() {
            return Ok(());
        }
        let table = quote_ident(id.table());
        let assignments = columns
            .iter()
            .map(|c| format!("{col} = r.{col}", col = quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} AS t SET {assignments}
             FROM json_populate_record(NULL::{table}, $1::text::json) AS r
             WHERE t.id::text = $2"
        );
        let payload = Value::Object(fields.clone()).to_string();
        let key = id.key().to_string();

        let updated = self.with_client(|c| c.execute(&sql, &[&payload, &key]))?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id::text = $1", quote_ident(id.table()));
        let key = id.key().to_string();
        self.with_client(|c| c.execute(&sql, &[&key]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("devices"), "\"devices\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_decode_notification() {
        let payload = r#"{"action":"INSERT","record":{"id":7,"hostname":"h"}}"#;
        let event = decode_notification("devices", payload).unwrap();
        assert_eq!(event.action, ChangeAction::Create);
        assert_eq!(event.row.unwrap().id, RecordId::new("devices", "7"));

        let payload = r#"{"action":"DELETE","record":{"hostname":"no id"}}"#;
        let event = decode_notification("devices", payload).unwrap();
        assert_eq!(event.action, ChangeAction::Delete);
        assert!(event.row.is_none());

        assert!(decode_notification("devices", r#"{"action":"TRUNCATE"}"#).is_none());
        assert!(decode_notification("devices", "not json").is_none());
    }

    #[test]
    fn test_decode_notification_keeps_colon_keys_bare() {
        let payload = r#"{"action":"UPDATE","record":{"id":"3C:22:FB:10:00:01","connected":true}}"#;
        let row = decode_notification("devices", payload).unwrap().row.unwrap();
        assert_eq!(row.id, RecordId::new("devices", "3C:22:FB:10:00:01"));

        let payload = r#"{"action":"INSERT","record":{"id":"devices:d1"}}"#;
        let row = decode_notification("devices", payload).unwrap().row.unwrap();
        assert_eq!(row.id.key(), "devices:d1");
    }

    #[test]
    fn test_connection_string() {
        let config = PgConfig {
            host: "db".into(),
            port: 5433,
            user: "svc".into(),
            password: None,
            database: "app".into(),
            tls: false,
            session_secret: None,
        };
        assert_eq!(
            config.connection_string("svc", None),
            "host=db port=5433 user=svc dbname=app"
        );
        assert_eq!(
            config.connection_string("alice", Some("pw")),
            "host=db port=5433 user=alice dbname=app password=pw"
        );
    }

    #[test]
    fn test_session_token_round_trip_without_database() {
        let store = PgStore::new(PgConfig {
            host: "localhost".into(),
            port: 5432,
            user: "svc".into(),
            password: None,
            database: "app".into(),
            tls: false,
            session_secret: Some("test-secret".into()),
        });
        let claims = SessionClaims {
            sub: "alice".into(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(store.authenticate(&SessionToken(token)).is_ok());

        let forged = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"other"),
        )
        .unwrap();
        assert!(matches!(
            store.authenticate(&SessionToken(forged)),
            Err(StoreError::Auth(_))
        ));
    }
}
