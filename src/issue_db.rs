use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, SubsecRound, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::issue::{Issue, UpdateIssueRequest};

/// Stored timestamp layout. Fixed-width fractional seconds keep the TEXT
/// column lexicographically sortable in chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const SEED_ISSUES: [(&str, &str, &str, &str, &str); 4] = [
    (
        "Fix login bug",
        "Users cannot login with special characters in password",
        "Open",
        "High",
        "John Doe",
    ),
    (
        "Add dark mode",
        "Implement dark mode theme for better user experience",
        "In Progress",
        "Medium",
        "Jane Smith",
    ),
    (
        "Optimize database queries",
        "Database queries are running slowly on large datasets",
        "Open",
        "Low",
        "Bob Johnson",
    ),
    (
        "Update documentation",
        "API documentation needs to be updated with new endpoints",
        "Closed",
        "Medium",
        "Alice Wilson",
    ),
];

/// Filter criteria for the listing query. Callers pass `None` rather than
/// empty strings; every present field narrows the result with AND.
#[derive(Debug, Default)]
pub struct IssueFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
}

/// Accepted sort keys for the listing endpoint. External camelCase names map
/// onto their columns here; anything outside the enumeration is rejected at
/// the API edge instead of reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Title,
    Description,
    Status,
    Priority,
    Assignee,
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    pub fn parse(name: &str) -> Option<SortKey> {
        match name {
            "id" => Some(SortKey::Id),
            "title" => Some(SortKey::Title),
            "description" => Some(SortKey::Description),
            "status" => Some(SortKey::Status),
            "priority" => Some(SortKey::Priority),
            "assignee" => Some(SortKey::Assignee),
            "createdAt" => Some(SortKey::CreatedAt),
            "updatedAt" => Some(SortKey::UpdatedAt),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Title => "title",
            SortKey::Description => "description",
            SortKey::Status => "status",
            SortKey::Priority => "priority",
            SortKey::Assignee => "assignee",
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Only "desc" (case-insensitive) selects descending; everything else
    /// sorts ascending.
    pub fn parse(value: &str) -> SortOrder {
        if value.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file, creates the schema if absent and
    /// seeds the sample issues when the table is completely empty. Runs at
    /// startup, before the server starts accepting connections.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        db.seed_if_empty()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS issues (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'Open',
                priority TEXT NOT NULL DEFAULT 'Medium',
                assignee TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
            CREATE INDEX IF NOT EXISTS idx_issues_priority ON issues(priority);
            CREATE INDEX IF NOT EXISTS idx_issues_assignee ON issues(assignee);
            "#,
        )
        .context("Failed to create schema")?;
        Ok(())
    }

    fn seed_if_empty(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        for (title, description, status, priority, assignee) in SEED_ISSUES {
            let ts = format_timestamp(now());
            conn.execute(
                "INSERT INTO issues (id, title, description, status, priority, assignee, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    title,
                    description,
                    status,
                    priority,
                    assignee,
                    ts
                ],
            )?;
        }
        info!("Seeded {} sample issues", SEED_ISSUES.len());
        Ok(())
    }

    /// Inserts a new issue with a fresh id and both timestamps set to the
    /// current instant. Absent status/priority fall back to the defaults.
    pub fn create_issue(
        &self,
        title: &str,
        description: Option<&str>,
        status: Option<&str>,
        priority: Option<&str>,
        assignee: Option<&str>,
    ) -> Result<Issue> {
        let ts = now();
        let issue = Issue {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            status: status.unwrap_or("Open").to_string(),
            priority: priority.unwrap_or("Medium").to_string(),
            assignee: assignee.map(str::to_string),
            created_at: ts,
            updated_at: ts,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO issues (id, title, description, status, priority, assignee, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                issue.id,
                issue.title,
                issue.description,
                issue.status,
                issue.priority,
                issue.assignee,
                format_timestamp(ts)
            ],
        )
        .context("Failed to insert issue")?;

        Ok(issue)
    }

    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, status, priority, assignee, created_at, updated_at
             FROM issues WHERE id = ?1",
        )?;
        let issue = stmt.query_row([id], row_to_issue).optional()?;
        Ok(issue)
    }

    /// Overwrites each field present in the request and always refreshes
    /// `updated_at`. Returns the updated record, `None` for an unknown id.
    pub fn update_issue(&self, id: &str, req: &UpdateIssueRequest) -> Result<Option<Issue>> {
        let ts = format_timestamp(now());
        let mut updates = vec!["updated_at = ?1".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(ts)];

        if let Some(title) = &req.title {
            updates.push(format!("title = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(title.clone()));
        }
        if let Some(description) = &req.description {
            updates.push(format!("description = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(description.clone()));
        }
        if let Some(status) = &req.status {
            updates.push(format!("status = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(status.clone()));
        }
        if let Some(priority) = &req.priority {
            updates.push(format!("priority = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(priority.clone()));
        }
        if let Some(assignee) = &req.assignee {
            updates.push(format!("assignee = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(assignee.clone()));
        }

        params_vec.push(Box::new(id.to_string()));
        let sql = format!(
            "UPDATE issues SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len()
        );

        let rows = {
            let conn = self.conn.lock().unwrap();
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            conn.execute(&sql, params_refs.as_slice())
                .context("Failed to update issue")?
        };

        if rows == 0 {
            return Ok(None);
        }
        self.get_issue(id)
    }

    /// Returns one page of issues matching the filter, ordered per the sort
    /// arguments, plus the total count of matches before pagination. Search
    /// is a substring match on the title; SQLite LIKE makes it ASCII
    /// case-insensitive.
    pub fn list_issues(
        &self,
        filter: &IssueFilter,
        sort_key: SortKey,
        sort_order: SortOrder,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Issue>, i64)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(search) = &filter.search {
            conditions.push(format!("title LIKE ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format!("%{}%", search)));
        }
        if let Some(status) = &filter.status {
            conditions.push(format!("status = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(status.clone()));
        }
        if let Some(priority) = &filter.priority {
            conditions.push(format!("priority = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(priority.clone()));
        }
        if let Some(assignee) = &filter.assignee {
            conditions.push(format!("assignee = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(assignee.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();

        let total: i64 = {
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            conn.query_row(
                &format!("SELECT COUNT(*) FROM issues{}", where_clause),
                params_refs.as_slice(),
                |row| row.get(0),
            )
            .context("Failed to count issues")?
        };

        let sql = format!(
            "SELECT id, title, description, status, priority, assignee, created_at, updated_at
             FROM issues{} ORDER BY {} {} LIMIT ?{} OFFSET ?{}",
            where_clause,
            sort_key.column(),
            sort_order.keyword(),
            params_vec.len() + 1,
            params_vec.len() + 2,
        );
        params_vec.push(Box::new(page_size));
        params_vec.push(Box::new((page - 1) * page_size));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let issues = stmt
            .query_map(params_refs.as_slice(), row_to_issue)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((issues, total))
    }
}

fn row_to_issue(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        assignee: row.get(5)?,
        created_at: parse_timestamp(row.get::<_, String>(6)?),
        updated_at: parse_timestamp(row.get::<_, String>(7)?),
    })
}

fn now() -> NaiveDateTime {
    // Truncated to microseconds so the value survives a storage round trip.
    Utc::now().naive_utc().trunc_subsecs(6)
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: String) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_test_db(dir: &TempDir) -> Database {
        Database::open(&dir.path().join("issues.db")).unwrap()
    }

    #[test]
    fn seeds_four_issues_once() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let (issues, total) =
            db.list_issues(&IssueFilter::default(), SortKey::UpdatedAt, SortOrder::Desc, 1, 10)
                .unwrap();
        assert_eq!(total, 4);
        assert_eq!(issues.len(), 4);

        db.create_issue("Extra", None, None, None, None).unwrap();
        drop(db);

        // Reopening a non-empty database must not seed again.
        let db = open_test_db(&dir);
        let (_, total) = db
            .list_issues(&IssueFilter::default(), SortKey::UpdatedAt, SortOrder::Desc, 1, 10)
            .unwrap();
        assert_eq!(total, 5);
    }

    #[test]
    fn create_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let issue = db
            .create_issue("Write release notes", None, None, None, None)
            .unwrap();
        assert_eq!(issue.status, "Open");
        assert_eq!(issue.priority, "Medium");
        assert_eq!(issue.description, None);
        assert_eq!(issue.assignee, None);
        assert_eq!(issue.created_at, issue.updated_at);

        let fetched = db.get_issue(&issue.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Write release notes");
        assert_eq!(fetched.created_at, issue.created_at);
    }

    #[test]
    fn get_unknown_id_is_none() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);
        assert!(db.get_issue("no-such-id").unwrap().is_none());
    }

    #[test]
    fn update_overwrites_only_present_fields() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let issue = db
            .create_issue("Flaky pipeline", Some("CI fails randomly"), None, None, Some("Jane Smith"))
            .unwrap();

        sleep(Duration::from_millis(5));
        let req = UpdateIssueRequest {
            status: Some("Closed".to_string()),
            ..Default::default()
        };
        let updated = db.update_issue(&issue.id, &req).unwrap().unwrap();

        assert_eq!(updated.status, "Closed");
        assert_eq!(updated.title, "Flaky pipeline");
        assert_eq!(updated.description.as_deref(), Some("CI fails randomly"));
        assert_eq!(updated.assignee.as_deref(), Some("Jane Smith"));
        assert_eq!(updated.created_at, issue.created_at);
        assert!(updated.updated_at > issue.updated_at);
    }

    #[test]
    fn update_with_no_fields_still_touches_updated_at() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let issue = db.create_issue("Touch me", None, None, None, None).unwrap();
        sleep(Duration::from_millis(5));
        let updated = db
            .update_issue(&issue.id, &UpdateIssueRequest::default())
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Touch me");
        assert!(updated.updated_at > issue.updated_at);
    }

    #[test]
    fn update_unknown_id_is_none() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);
        let req = UpdateIssueRequest {
            title: Some("ghost".to_string()),
            ..Default::default()
        };
        assert!(db.update_issue("no-such-id", &req).unwrap().is_none());
    }

    #[test]
    fn filters_combine_with_and() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        // Seeds hold two Open issues; only one of them is High priority.
        let filter = IssueFilter {
            status: Some("Open".to_string()),
            priority: Some("High".to_string()),
            ..Default::default()
        };
        let (issues, total) = db
            .list_issues(&filter, SortKey::UpdatedAt, SortOrder::Desc, 1, 10)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(issues[0].title, "Fix login bug");
    }

    #[test]
    fn status_filter_is_exact_match() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let filter = IssueFilter {
            status: Some("Open".to_string()),
            ..Default::default()
        };
        let (issues, total) = db
            .list_issues(&filter, SortKey::UpdatedAt, SortOrder::Desc, 1, 10)
            .unwrap();
        assert_eq!(total, 2);
        assert!(issues.iter().all(|i| i.status == "Open"));
    }

    #[test]
    fn search_matches_title_substring_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let filter = IssueFilter {
            search: Some("LOGIN".to_string()),
            ..Default::default()
        };
        let (issues, total) = db
            .list_issues(&filter, SortKey::UpdatedAt, SortOrder::Desc, 1, 10)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(issues[0].title, "Fix login bug");
    }

    #[test]
    fn sorts_by_title_ascending() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let (issues, _) = db
            .list_issues(&IssueFilter::default(), SortKey::Title, SortOrder::Asc, 1, 10)
            .unwrap();
        let titles: Vec<&str> = issues.iter().map(|i| i.title.as_str()).collect();
        let mut sorted = titles.clone();
        sorted.sort();
        assert_eq!(titles, sorted);
    }

    #[test]
    fn paginates_with_total_before_windowing() {
        let dir = TempDir::new().unwrap();
        let db = open_test_db(&dir);

        let (page_one, total) = db
            .list_issues(&IssueFilter::default(), SortKey::Title, SortOrder::Asc, 1, 2)
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(page_one.len(), 2);

        let (page_two, _) = db
            .list_issues(&IssueFilter::default(), SortKey::Title, SortOrder::Asc, 2, 2)
            .unwrap();
        assert_eq!(page_two.len(), 2);
        assert_ne!(page_one[0].id, page_two[0].id);
    }

    #[test]
    fn sort_key_rejects_unknown_names() {
        assert_eq!(SortKey::parse("updatedAt"), Some(SortKey::UpdatedAt));
        assert_eq!(SortKey::parse("createdAt"), Some(SortKey::CreatedAt));
        assert_eq!(SortKey::parse("title"), Some(SortKey::Title));
        assert_eq!(SortKey::parse("updated_at"), None);
        assert_eq!(SortKey::parse("DROP TABLE issues"), None);
    }

    #[test]
    fn sort_order_defaults_to_ascending() {
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("descending"), SortOrder::Asc);
    }

    #[test]
    fn timestamps_round_trip_through_storage() {
        let ts = now();
        assert_eq!(parse_timestamp(format_timestamp(ts)), ts);
    }
}
