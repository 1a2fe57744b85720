//! Static registry of filterable fields per resource.
//!
//! The registry is plain `static` data: it is built at compile time, never
//! mutated, and safe to read from any number of concurrent requests. A field
//! that is not listed here cannot appear in a compiled predicate.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Semantic type of a field. Determines value coercion and legal operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Id,
    Enum,
    Boolean,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    In,
    Gt,
    Lt,
    Gte,
    Lte,
    Between,
}

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::Contains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::In,
];
const ENUM_OPERATORS: &[Operator] = &[Operator::Equals, Operator::In];
const BOOLEAN_OPERATORS: &[Operator] = &[Operator::Equals];
const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::Between,
];
const DATE_OPERATORS: &[Operator] = &[Operator::Equals, Operator::Between];

impl FieldType {
    /// Operators legal for this type.
    pub const fn operators(self) -> &'static [Operator] {
        match self {
            FieldType::String | FieldType::Id => TEXT_OPERATORS,
            FieldType::Enum => ENUM_OPERATORS,
            FieldType::Boolean => BOOLEAN_OPERATORS,
            FieldType::Number => NUMBER_OPERATORS,
            FieldType::Date => DATE_OPERATORS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnumOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Logical name used by filter trees and in-memory records.
    pub key: &'static str,
    pub label: &'static str,
    /// Physical column the field compiles to. Never exposed to callers.
    #[serde(skip)]
    pub column: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "no_enum_values")]
    pub enum_values: &'static [EnumOption],
    pub operators: &'static [Operator],
}

fn no_enum_values(values: &&'static [EnumOption]) -> bool {
    values.is_empty()
}

impl FieldDef {
    pub const fn new(
        key: &'static str,
        label: &'static str,
        column: &'static str,
        field_type: FieldType,
    ) -> Self {
        Self {
            key,
            label,
            column,
            field_type,
            enum_values: &[],
            operators: field_type.operators(),
        }
    }

    pub const fn enumeration(
        key: &'static str,
        label: &'static str,
        column: &'static str,
        values: &'static [EnumOption],
    ) -> Self {
        let mut def = Self::new(key, label, column, FieldType::Enum);
        def.enum_values = values;
        def
    }

    /// Narrows the operator set below the type's default.
    pub const fn with_operators(mut self, operators: &'static [Operator]) -> Self {
        self.operators = operators;
        self
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }
}

/// Resources exposed through the filter-tree path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Resource {
    Clients,
    Invoices,
    Licenses,
    CashAccounts,
    CashTransactions,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    pub resource: Resource,
    pub table: &'static str,
    pub tenant_column: &'static str,
    pub fields: &'static [FieldDef],
}

impl ResourceSchema {
    pub fn field(&self, key: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn field_keys(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.key.to_string()).collect()
    }
}

const fn opt(value: &'static str, label: &'static str) -> EnumOption {
    EnumOption { value, label }
}

static CLIENT_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "ID", "id", FieldType::Id),
    FieldDef::new("name", "Name", "name", FieldType::String),
    FieldDef::new("email", "Email", "email", FieldType::String),
    FieldDef::enumeration(
        "status",
        "Status",
        "status",
        &[
            opt("active", "Active"),
            opt("inactive", "Inactive"),
            opt("trial", "Trial"),
        ],
    ),
    FieldDef::enumeration(
        "plan",
        "Plan",
        "plan",
        &[
            opt("basic", "Basic"),
            opt("professional", "Professional"),
            opt("enterprise", "Enterprise"),
        ],
    ),
    FieldDef::new("monthlyValue", "Monthly value", "monthly_value", FieldType::Number),
    FieldDef::new("autoRenew", "Auto renew", "auto_renew", FieldType::Boolean),
    FieldDef::new("createdAt", "Created", "created_at", FieldType::Date),
];

static INVOICE_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "ID", "id", FieldType::Id),
    FieldDef::new("invoiceNumber", "Invoice number", "invoice_number", FieldType::String),
    FieldDef::new("clientId", "Client", "client_id", FieldType::Id)
        .with_operators(&[Operator::Equals, Operator::In]),
    FieldDef::enumeration(
        "status",
        "Status",
        "status",
        &[
            opt("draft", "Draft"),
            opt("sent", "Sent"),
            opt("paid", "Paid"),
            opt("overdue", "Overdue"),
            opt("cancelled", "Cancelled"),
        ],
    ),
    FieldDef::new("amount", "Amount", "amount", FieldType::Number),
    FieldDef::new("currency", "Currency", "currency", FieldType::String),
    FieldDef::new("issueDate", "Issue date", "issue_date", FieldType::Date),
    FieldDef::new("dueDate", "Due date", "due_date", FieldType::Date),
];

static LICENSE_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "ID", "id", FieldType::Id),
    FieldDef::new("licenseKey", "License key", "license_key", FieldType::String),
    FieldDef::new("clientId", "Client", "client_id", FieldType::Id)
        .with_operators(&[Operator::Equals, Operator::In]),
    FieldDef::new("product", "Product", "product", FieldType::String),
    FieldDef::enumeration(
        "status",
        "Status",
        "status",
        &[
            opt("active", "Active"),
            opt("expired", "Expired"),
            opt("suspended", "Suspended"),
            opt("revoked", "Revoked"),
        ],
    ),
    FieldDef::new("seats", "Seats", "seats", FieldType::Number),
    FieldDef::new("autoRenew", "Auto renew", "auto_renew", FieldType::Boolean),
    FieldDef::new("expiresAt", "Expires", "expires_at", FieldType::Date),
];

static CASH_ACCOUNT_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "ID", "id", FieldType::Id),
    FieldDef::new("name", "Name", "name", FieldType::String),
    FieldDef::enumeration(
        "accountType",
        "Type",
        "account_type",
        &[opt("cash", "Cash"), opt("bank", "Bank"), opt("card", "Card")],
    ),
    FieldDef::new("balance", "Balance", "balance", FieldType::Number),
    FieldDef::new("currency", "Currency", "currency", FieldType::String),
    FieldDef::new("isActive", "Active", "is_active", FieldType::Boolean),
    FieldDef::new("openedAt", "Opened", "opened_at", FieldType::Date),
];

static CASH_TRANSACTION_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "ID", "id", FieldType::Id),
    FieldDef::new("accountId", "Account", "account_id", FieldType::Id)
        .with_operators(&[Operator::Equals, Operator::In]),
    FieldDef::enumeration(
        "direction",
        "Direction",
        "direction",
        &[opt("inflow", "Inflow"), opt("outflow", "Outflow")],
    ),
    FieldDef::new("category", "Category", "category", FieldType::String),
    FieldDef::new("description", "Description", "description", FieldType::String),
    FieldDef::new("amount", "Amount", "amount", FieldType::Number),
    FieldDef::new("reconciled", "Reconciled", "reconciled", FieldType::Boolean),
    FieldDef::new("occurredAt", "Date", "occurred_at", FieldType::Date),
];

static SCHEMAS: [ResourceSchema; 5] = [
    ResourceSchema {
        resource: Resource::Clients,
        table: "clients",
        tenant_column: "tenant_id",
        fields: CLIENT_FIELDS,
    },
    ResourceSchema {
        resource: Resource::Invoices,
        table: "invoices",
        tenant_column: "tenant_id",
        fields: INVOICE_FIELDS,
    },
    ResourceSchema {
        resource: Resource::Licenses,
        table: "licenses",
        tenant_column: "tenant_id",
        fields: LICENSE_FIELDS,
    },
    ResourceSchema {
        resource: Resource::CashAccounts,
        table: "cash_accounts",
        tenant_column: "tenant_id",
        fields: CASH_ACCOUNT_FIELDS,
    },
    ResourceSchema {
        resource: Resource::CashTransactions,
        table: "cash_transactions",
        tenant_column: "tenant_id",
        fields: CASH_TRANSACTION_FIELDS,
    },
];

pub fn schema_for(resource: Resource) -> &'static ResourceSchema {
    match resource {
        Resource::Clients => &SCHEMAS[0],
        Resource::Invoices => &SCHEMAS[1],
        Resource::Licenses => &SCHEMAS[2],
        Resource::CashAccounts => &SCHEMAS[3],
        Resource::CashTransactions => &SCHEMAS[4],
    }
}

/// Ordered filterable fields of a resource.
pub fn fields_for(resource: Resource) -> &'static [FieldDef] {
    schema_for(resource).fields
}

pub fn all_resources() -> Vec<Resource> {
    Resource::iter().collect()
}
