use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use server::backend::{
    AccessToken, AuthSession, AuthUser, Backend, BackendError, Filter, SignUp, StoredObject,
    TableQuery,
};
use tokio::sync::Notify;

/// Columns that together must be unique, per table.
const UNIQUE_KEYS: &[(&str, &[&str])] = &[
    ("applications", &["student_id", "vacancy_id"]),
    ("vacancy_favorites", &["student_id", "vacancy_id"]),
    ("vacancy_hidden", &["student_id", "vacancy_id"]),
    ("group_members", &["group_id", "student_id"]),
    ("vacancy_programs", &["vacancy_id", "program_id"]),
];

/// Finished applications no longer hold the unique slot, so a student can
/// apply again after completing a practice.
const RELEASED_STATUSES: &[&str] = &["completada", "terminada", "finalizada"];

/// In-process stand-in for the hosted backend: tables are JSON rows,
/// tokens map straight to users, procedures are emulated.
///
/// Row-level security is not modelled. Handlers scope every query by
/// owner themselves, which is what these tests exercise.
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    tokens: Mutex<HashMap<String, AuthUser>>,
    passwords: Mutex<HashMap<String, (String, String)>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<(String, Value)>>,
    failing_rpcs: Mutex<HashSet<String>>,
    held_select: Mutex<Option<HeldSelect>>,
    next_id: AtomicI64,
}

/// A select parked until the test releases it.
struct HeldSelect {
    table: String,
    gate: SelectGate,
}

/// Handles for a held select: `entered` fires once the select is parked,
/// `release` lets it finish.
#[derive(Clone, Default)]
pub struct SelectGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            tables: Mutex::default(),
            tokens: Mutex::default(),
            passwords: Mutex::default(),
            objects: Mutex::default(),
            calls: Mutex::default(),
            failing_rpcs: Mutex::default(),
            held_select: Mutex::default(),
            next_id: AtomicI64::new(1000),
        }
    }
}

impl MemoryBackend {
    /// Register a user reachable through `token` and signable with `password`.
    pub fn add_user(&self, id: &str, email: &str, token: &str, password: &str) {
        let user = AuthUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_metadata: json!({}),
        };
        self.tokens.lock().unwrap().insert(token.to_string(), user);
        self.passwords
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), token.to_string()));
    }

    /// Insert rows as-is, skipping unique checks.
    pub fn seed(&self, table: &str, rows: Value) {
        let rows = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Raw rows of a table, without embeds.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Procedures called so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every later call to procedure `name` fail with a 500.
    pub fn fail_rpc(&self, name: &str) {
        self.failing_rpcs.lock().unwrap().insert(name.to_string());
    }

    /// Park the next select on `table` until the returned gate is released.
    pub fn hold_next_select(&self, table: &str) -> SelectGate {
        let gate = SelectGate::default();
        *self.held_select.lock().unwrap() = Some(HeldSelect {
            table: table.to_string(),
            gate: gate.clone(),
        });
        gate
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{path}"))
            .cloned()
    }

    fn user_for(&self, token: &AccessToken) -> Result<AuthUser, BackendError> {
        self.tokens
            .lock()
            .unwrap()
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| BackendError::new(401, "JWT expired"))
    }

    fn fresh_id(&self) -> i64 {
        self.next_id.fetch_add(1, AtomicOrdering::SeqCst)
    }

    fn insert_rows(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let mut tables = self.tables.lock().unwrap();
        let existing = tables.entry(table.to_string()).or_default();
        let key = UNIQUE_KEYS
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, cols)| *cols);

        let mut inserted = Vec::new();
        for row in rows {
            let mut row = match row {
                Value::Object(map) => map,
                other => {
                    return Err(BackendError::new(400, format!("Fila inválida: {other}")));
                }
            };
            if let Some(cols) = key {
                let clash = existing.iter().chain(inserted.iter()).any(|other: &Value| {
                    let released = table == "applications"
                        && text(other.get("status"))
                            .is_some_and(|s| RELEASED_STATUSES.contains(&s.as_str()));
                    !released
                        && cols.iter().all(|c| {
                            let mine = text(row.get(*c));
                            mine.is_some() && mine == text(other.get(*c))
                        })
                });
                if clash {
                    return Err(BackendError::new(
                        409,
                        format!("duplicate key value violates unique constraint on {table}"),
                    )
                    .with_code("23505"));
                }
            }
            row.entry("id").or_insert_with(|| json!(self.fresh_id()));
            row.entry("created_at")
                .or_insert_with(|| json!(chrono::Utc::now().to_rfc3339()));
            inserted.push(Value::Object(row));
        }
        existing.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    fn update_rows(&self, table: &str, filters: &[Filter], patch: &Value) -> Vec<Value> {
        let mut tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get_mut(table) else {
            return Vec::new();
        };
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if !filters.iter().all(|f| matches(row, f)) {
                continue;
            }
            if let (Value::Object(target), Value::Object(changes)) = (&mut *row, patch) {
                for (k, v) in changes {
                    target.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        updated
    }

    /// Attach the embedded resources the repos ask for.
    fn embed(&self, table: &str, row: &Value) -> Value {
        let tables = self.tables.lock().unwrap();
        embed_row(&tables, table, row)
    }
}

fn find_by_id<'a>(
    tables: &'a HashMap<String, Vec<Value>>,
    table: &str,
    id: Option<&Value>,
) -> Option<&'a Value> {
    let id = text(id)?;
    tables
        .get(table)?
        .iter()
        .find(|r| text(r.get("id")).as_deref() == Some(id.as_str()))
}

fn embed_row(tables: &HashMap<String, Vec<Value>>, table: &str, row: &Value) -> Value {
    let mut out = row.clone();
    if let Value::Object(map) = &mut out {
        match table {
            "vacancies" => {
                if let Some(company) = find_by_id(tables, "companies", row.get("company_id")) {
                    map.insert("company".into(), company.clone());
                }
                let id = text(row.get("id"));
                let programs: Vec<Value> = tables
                    .get("vacancy_programs")
                    .map(|links| {
                        links
                            .iter()
                            .filter(|l| text(l.get("vacancy_id")) == id)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                map.insert("vacancy_programs".into(), Value::Array(programs));
            }
            "applications" | "practices" => {
                if let Some(vacancy) = find_by_id(tables, "vacancies", row.get("vacancy_id")) {
                    map.insert("vacancy".into(), embed_row(tables, "vacancies", vacancy));
                }
                if let Some(student) = find_by_id(tables, "profiles", row.get("student_id")) {
                    map.insert("student".into(), student.clone());
                }
            }
            _ => {}
        }
    }
    out
}

/// Scalar as text, the way PostgREST compares filter operands.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Values at a possibly dotted path. Arrays along the way fan out.
fn lookup(row: &Value, path: &str) -> Vec<Value> {
    let mut current = vec![row.clone()];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value.get(segment) {
                Some(Value::Array(items)) => next.extend(items.iter().cloned()),
                Some(found) => next.push(found.clone()),
                None => {}
            }
        }
        current = next;
    }
    current
}

fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Case-insensitive `LIKE` with `%` as the only wildcard.
fn like(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return value == pattern;
    }
    let mut rest = value.as_str();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let values = |column: &str| -> Vec<String> {
        lookup(row, column).iter().filter_map(|v| text(Some(v))).collect()
    };
    match filter {
        Filter::Eq(c, v) => values(c).iter().any(|x| x == v),
        Filter::Neq(c, v) => {
            let found = values(c);
            !found.is_empty() && found.iter().all(|x| x != v)
        }
        Filter::Gt(c, v) => values(c).iter().any(|x| compare(x, v) == Ordering::Greater),
        Filter::Gte(c, v) => values(c).iter().any(|x| compare(x, v) != Ordering::Less),
        Filter::Lt(c, v) => values(c).iter().any(|x| compare(x, v) == Ordering::Less),
        Filter::Ilike(c, p) => values(c).iter().any(|x| like(x, p)),
        Filter::In(c, list) => values(c).iter().any(|x| list.contains(x)),
        Filter::NotIn(c, list) => {
            let found = values(c);
            !found.is_empty() && found.iter().all(|x| !list.contains(x))
        }
        Filter::IsNull(c) => values(c).is_empty(),
        Filter::NotNull(c) => !values(c).is_empty(),
        Filter::Or(inner) => inner.iter().any(|f| matches(row, f)),
    }
}

fn order_rows(rows: &mut [Value], ordering: &[(String, bool)]) {
    rows.sort_by(|a, b| {
        for (column, ascending) in ordering {
            let x = text(a.get(column.as_str()));
            let y = text(b.get(column.as_str()));
            let ord = match (x, y) {
                (Some(x), Some(y)) => {
                    let ord = compare(&x, &y);
                    if *ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
                // Nulls last either way.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn arg(args: &Value, key: &str) -> Option<String> {
    text(args.get(key))
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let token = match self.passwords.lock().unwrap().get(email) {
            Some((stored, token)) if stored == password => token.clone(),
            _ => return Err(BackendError::new(400, "Invalid login credentials")),
        };
        let user = self.user_for(&AccessToken::new(token.clone()))?;
        Ok(AuthSession {
            access_token: token.clone(),
            refresh_token: format!("refresh-{token}"),
            expires_in: 3600,
            user,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<SignUp, BackendError> {
        if self.passwords.lock().unwrap().contains_key(email) {
            return Err(BackendError::new(422, "User already registered"));
        }
        let id = format!("user-{}", self.fresh_id());
        let token = format!("token-{id}");
        self.add_user(&id, email, &token, password);
        self.seed("profiles", json!({ "id": id, "email": email, "role": "student" }));
        let user = AuthUser {
            id,
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        Ok(SignUp {
            session: Some(AuthSession {
                access_token: token.clone(),
                refresh_token: format!("refresh-{token}"),
                expires_in: 3600,
                user: user.clone(),
            }),
            user,
        })
    }

    async fn sign_out(&self, _token: &AccessToken) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError> {
        Ok(self.tokens.lock().unwrap().get(token.as_str()).cloned())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let token = refresh_token
            .strip_prefix("refresh-")
            .ok_or_else(|| BackendError::new(400, "Invalid Refresh Token"))?;
        let user = self
            .user_for(&AccessToken::new(token))
            .map_err(|_| BackendError::new(400, "Invalid Refresh Token"))?;
        Ok(AuthSession {
            access_token: token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: 3600,
            user,
        })
    }

    async fn reset_password_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push((
            "recover".to_string(),
            json!({ "email": email, "redirect_to": redirect_to }),
        ));
        Ok(())
    }

    async fn select(
        &self,
        _token: &AccessToken,
        query: &TableQuery,
    ) -> Result<Vec<Value>, BackendError> {
        let held = {
            let mut slot = self.held_select.lock().unwrap();
            match slot.as_ref() {
                Some(h) if h.table == query.table() => slot.take(),
                _ => None,
            }
        };
        if let Some(held) = held {
            held.gate.entered.notify_one();
            held.gate.release.notified().await;
        }

        let raw = self.rows(query.table());
        let mut rows: Vec<Value> = raw
            .iter()
            .map(|row| self.embed(query.table(), row))
            .filter(|row| query.filters().iter().all(|f| matches(row, f)))
            .collect();
        order_rows(&mut rows, query.ordering());

        let (offset, limit) = query.window();
        let rows = rows.into_iter().skip(offset.max(0) as usize);
        Ok(match limit {
            Some(limit) => rows.take(limit.max(0) as usize).collect(),
            None => rows.collect(),
        })
    }

    async fn insert(
        &self,
        _token: &AccessToken,
        table: &str,
        rows: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let rows = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };
        self.insert_rows(table, rows)
    }

    async fn update(
        &self,
        _token: &AccessToken,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        Ok(self.update_rows(table, filters, &patch))
    }

    async fn delete(
        &self,
        _token: &AccessToken,
        table: &str,
        filters: &[Filter],
    ) -> Result<(), BackendError> {
        if let Some(rows) = self.tables.lock().unwrap().get_mut(table) {
            rows.retain(|row| !filters.iter().all(|f| matches(row, f)));
        }
        Ok(())
    }

    async fn upload(
        &self,
        _token: &AccessToken,
        bucket: &str,
        path: &str,
        _content_type: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> Result<(), BackendError> {
        let mut objects = self.objects.lock().unwrap();
        let key = format!("{bucket}/{path}");
        if !upsert && objects.contains_key(&key) {
            return Err(BackendError::new(409, "The resource already exists"));
        }
        objects.insert(key, bytes);
        Ok(())
    }

    async fn list(
        &self,
        _token: &AccessToken,
        bucket: &str,
        prefix: &str,
        search: Option<&str>,
    ) -> Result<Vec<StoredObject>, BackendError> {
        let folder = format!("{bucket}/{}", prefix.trim_end_matches('/'));
        let objects = self.objects.lock().unwrap();
        let mut names: Vec<StoredObject> = objects
            .keys()
            .filter_map(|key| key.strip_prefix(&folder))
            .filter_map(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.contains('/'))
            .filter(|name| search.map_or(true, |s| name.contains(s)))
            .map(|name| StoredObject {
                name: name.to_string(),
            })
            .collect();
        names.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(names)
    }

    async fn remove(
        &self,
        _token: &AccessToken,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), BackendError> {
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(&format!("{bucket}/{path}"));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("http://storage.test/{bucket}/{path}")
    }

    async fn rpc(&self, token: &AccessToken, name: &str, args: Value) -> Result<Value, BackendError> {
        let user = self.user_for(token)?;
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), args.clone()));
        if self.failing_rpcs.lock().unwrap().contains(name) {
            return Err(BackendError::new(500, format!("{name} failed")));
        }
        let now = chrono::Utc::now().to_rfc3339();

        match name {
            "apply_and_notify" | "apply_and_notify_v2" => {
                let vacancy_id = args.get("p_vacancy_id").cloned().unwrap_or(Value::Null);
                let rows = self.insert_rows(
                    "applications",
                    vec![json!({
                        "student_id": user.id,
                        "vacancy_id": vacancy_id,
                        "status": "postulada",
                        "applied_at": now,
                    })],
                )?;
                Ok(rows.into_iter().next().unwrap_or(Value::Null))
            }
            "student_accept_offer" => {
                let id = arg(&args, "p_app_id").unwrap_or_default();
                let accepted = self.update_rows(
                    "applications",
                    &[Filter::eq("id", &id), Filter::eq("student_id", &user.id)],
                    &json!({ "status": "aceptada", "decision": "accepted", "decision_at": now }),
                );
                let Some(app) = accepted.into_iter().next() else {
                    return Err(BackendError::new(404, "Oferta no encontrada").with_code("PGRST116"));
                };
                self.insert_rows(
                    "practices",
                    vec![json!({
                        "student_id": user.id,
                        "vacancy_id": app.get("vacancy_id").cloned().unwrap_or(Value::Null),
                        "status": "active",
                    })],
                )?;
                Ok(Value::Null)
            }
            "complete_practice_with_rating" => {
                let student = arg(&args, "p_student_id").unwrap_or_default();
                self.update_rows(
                    "practices",
                    &[Filter::eq("student_id", &student), Filter::eq("status", "active")],
                    &json!({ "status": "completed", "rating": args.get("p_rating") }),
                );
                Ok(Value::Null)
            }
            "mark_notifications_as_read" => {
                self.update_rows(
                    "notifications",
                    &[Filter::eq("student_id", &user.id), Filter::IsNull("read_at".into())],
                    &json!({ "read_at": now }),
                );
                Ok(Value::Null)
            }
            "company_accept_application" => {
                let id = arg(&args, "p_application_id").unwrap_or_default();
                self.update_rows("applications", &[Filter::eq("id", &id)], &json!({ "status": "oferta" }));
                Ok(Value::Null)
            }
            "company_set_application_status" => {
                let id = arg(&args, "p_app_id").unwrap_or_default();
                let status = arg(&args, "p_status").unwrap_or_default();
                self.update_rows("applications", &[Filter::eq("id", &id)], &json!({ "status": status }));
                Ok(Value::Null)
            }
            "professor_recommend_vacancy" | "create_company_notification" => {
                let mut row = Map::new();
                row.insert("student_id".into(), args.get("p_student_id").cloned().unwrap_or(Value::Null));
                row.insert("type".into(), json!(args.get("p_type").cloned().unwrap_or(json!("recommendation"))));
                row.insert("title".into(), args.get("p_title").cloned().unwrap_or(json!("Recomendación")));
                self.insert_rows("notifications", vec![Value::Object(row)])?;
                Ok(Value::Null)
            }
            other => Err(BackendError::new(404, format!("Could not find the function {other}"))
                .with_code("PGRST202")),
        }
    }

    async fn health(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_handles_wildcards() {
        assert!(like("Backend Rust", "%rust%"));
        assert!(like("Backend Rust", "back%"));
        assert!(like("Backend Rust", "%rust"));
        assert!(!like("Backend Rust", "%java%"));
        assert!(like("abc", "abc"));
    }

    #[test]
    fn dotted_paths_fan_out_over_arrays() {
        let row = json!({ "vacancy_programs": [{ "program_id": 1 }, { "program_id": 4 }] });
        assert!(matches(&row, &Filter::eq("vacancy_programs.program_id", "4")));
        assert!(!matches(&row, &Filter::eq("vacancy_programs.program_id", "2")));
    }
}
