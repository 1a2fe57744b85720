//! Shared test helpers for database tests.
use super::Database;
use sqlx::sqlite::SqlitePoolOptions;

pub const TENANT_A: &str = "tenant-a";
pub const TENANT_B: &str = "tenant-b";

/// In-memory database with all migrations applied. A single connection that
/// never expires keeps the in-memory schema alive for the whole test.
pub async fn setup_test_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    let db = Database::from_pool(pool);
    db.migrate().await.expect("Migrations failed");
    db
}

#[derive(Debug, Clone)]
pub struct TestClient {
    pub id: i64,
    pub tenant_id: &'static str,
    pub name: &'static str,
    pub email: Option<&'static str>,
    pub status: &'static str,
    pub plan: Option<&'static str>,
    pub monthly_value: Option<f64>,
    pub auto_renew: bool,
    pub created_at: &'static str,
}

impl TestClient {
    pub fn new(id: i64, name: &'static str, status: &'static str) -> Self {
        Self {
            id,
            tenant_id: TENANT_A,
            name,
            email: None,
            status,
            plan: None,
            monthly_value: None,
            auto_renew: false,
            created_at: "2024-01-01",
        }
    }
}

pub async fn insert_client(db: &Database, client: &TestClient) {
    sqlx::query(
        "INSERT INTO clients (id, tenant_id, name, email, status, plan, monthly_value, auto_renew, created_at, tax_id, internal_notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'TAX-SECRET', 'do not show')",
    )
    .bind(client.id)
    .bind(client.tenant_id)
    .bind(client.name)
    .bind(client.email)
    .bind(client.status)
    .bind(client.plan)
    .bind(client.monthly_value)
    .bind(client.auto_renew)
    .bind(client.created_at)
    .execute(&db.pool)
    .await
    .expect("Failed to insert client");
}

/// Mixed-case names, LIKE wildcards, NULLs and both date shapes. Ids 1-10
/// belong to [`TENANT_A`], 11-12 to [`TENANT_B`].
pub fn client_fixture() -> Vec<TestClient> {
    let row = |id: i64, name, email, status, plan, value, renew, created| TestClient {
        id,
        tenant_id: if id > 10 { TENANT_B } else { TENANT_A },
        name,
        email,
        status,
        plan,
        monthly_value: value,
        auto_renew: renew,
        created_at: created,
    };
    vec![
        row(1, "Acme Corp", Some("billing@acme.com"), "active", Some("enterprise"), Some(5000.0), true, "2024-01-15T09:30:00Z"),
        row(2, "Beta LLC", Some("beta@example.com"), "inactive", Some("basic"), Some(500.0), false, "2023-12-31"),
        row(3, "gamma_50% Partners", None, "trial", Some("professional"), Some(2500.0), true, "2024-03-01T23:59:59Z"),
        row(4, "ACME Labs", Some("labs@acme.io"), "active", Some("basic"), Some(1500.0), false, "2024-02-29T00:00:00Z"),
        row(5, "Delta", Some("delta@example.com"), "active", None, None, false, "2024-01-01"),
        row(6, "epsilon", Some("eps@EXAMPLE.com"), "trial", Some("enterprise"), Some(12000.5), true, "2022-06-15T12:00:00Z"),
        row(7, "Zeta Holdings", None, "inactive", Some("professional"), Some(0.0), false, "2024-01-15"),
        row(8, "Eta \\ Co", Some("eta@example.com"), "trial", Some("basic"), Some(999.99), true, "2024-02-01T08:00:00Z"),
        row(9, "Theta 100%", Some("theta@example.com"), "active", Some("enterprise"), Some(100.0), true, "2024-12-31T23:59:59Z"),
        row(10, "Iota", Some("iota@example.com"), "active", Some("basic"), Some(1500.0), true, "2024-06-30"),
        row(11, "Acme Corp", Some("billing@acme.com"), "active", Some("enterprise"), Some(5000.0), true, "2024-01-15"),
        row(12, "Other Tenant Co", None, "trial", Some("basic"), Some(2000.0), false, "2024-01-20"),
    ]
}

pub async fn seed_clients(db: &Database) {
    for client in client_fixture() {
        insert_client(db, &client).await;
    }
}

pub async fn insert_invoice(
    db: &Database,
    id: i64,
    tenant_id: &str,
    number: &str,
    status: &str,
    amount: f64,
    paid_at: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO invoices (id, tenant_id, invoice_number, client_id, status, amount, currency, issue_date, due_date, paid_at, pdf_blob)
         VALUES (?, ?, ?, 1, ?, ?, 'EUR', '2024-01-01', '2024-01-31', ?, x'25504446')",
    )
    .bind(id)
    .bind(tenant_id)
    .bind(number)
    .bind(status)
    .bind(amount)
    .bind(paid_at)
    .execute(&db.pool)
    .await
    .expect("Failed to insert invoice");
}
