//! SQL statement construction with identifier and literal quoting.

use crate::error::Error;
use crate::target::{AttributeValue, ExtensionTarget, RoleTarget};

// Words that can never stand bare as an identifier.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both", "case",
    "cast", "check", "collate", "column", "constraint", "create", "current_catalog", "current_date",
    "current_role", "current_time", "current_timestamp", "current_user", "default", "deferrable",
    "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign", "from",
    "grant", "group", "having", "in", "initially", "intersect", "into", "lateral", "leading", "limit",
    "localtime", "localtimestamp", "not", "null", "offset", "on", "only", "or", "order", "placing",
    "primary", "references", "returning", "select", "session_user", "some", "symmetric", "table",
    "then", "to", "trailing", "true", "union", "unique", "user", "using", "variadic", "when",
    "where", "window", "with",
];

const DATABASE_PRIVILEGES: &[&str] = &["CREATE", "CONNECT", "TEMPORARY", "TEMP", "ALL", "ALL PRIVILEGES"];

/// Quote `name` as an identifier, leaving plain lowercase names bare.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !RESERVED.contains(&name);
    if plain { name.to_string() } else { quote_ident_always(name) }
}

pub fn quote_ident_always(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

pub fn database_exists_sql(name: &str) -> String {
    format!("SELECT datname from pg_database WHERE datname={}", quote_literal(name))
}

pub fn role_exists_sql(name: &str) -> String {
    format!("SELECT rolname FROM pg_roles WHERE rolname={};", quote_literal(name))
}

pub fn extension_installed_sql(name: &str) -> String {
    format!("SELECT 'installed' FROM pg_extension WHERE extname = {};", quote_literal(name))
}

pub fn pending_restart_sql() -> &'static str {
    "SELECT count(*) FROM pg_settings WHERE pending_restart='t';"
}

/// `<name> WITH <six flags> [password] [VALID UNTIL ..]`, flags in fixed order.
pub fn role_clause(role: &RoleTarget) -> String {
    let mut parts = vec![quote_ident(&role.name), "WITH".to_string()];
    for (perm, on) in role.flags.ordered() {
        parts.push(format!("{}{}", if on { "" } else { "NO" }, perm));
    }
    if let Some(p) = &role.encrypted_password {
        parts.push(format!("ENCRYPTED PASSWORD {}", quote_literal(p)));
    } else if let Some(p) = &role.password {
        parts.push(format!("PASSWORD {}", quote_literal(p)));
    }
    if let Some(t) = &role.valid_until {
        parts.push(format!("VALID UNTIL {}", quote_literal(t)));
    }
    parts.join(" ")
}

pub fn create_role_sql(role: &RoleTarget) -> String { format!("CREATE ROLE {}", role_clause(role)) }

pub fn alter_role_sql(role: &RoleTarget) -> String { format!("ALTER ROLE {}", role_clause(role)) }

pub fn alter_role_set_sql(role: &str, attribute: &str, value: &AttributeValue) -> String {
    let v = match value {
        AttributeValue::Bool(_) | AttributeValue::Int(_) => value.to_string(),
        AttributeValue::Text(s) => quote_literal(s),
    };
    format!("ALTER ROLE {} SET {} = {}", quote_ident(role), quote_ident(attribute), v)
}

pub fn drop_role_sql(name: &str) -> String { format!("DROP ROLE IF EXISTS {}", quote_ident(name)) }

pub fn create_extension_sql(ext: &ExtensionTarget) -> String {
    let mut sql = format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(&ext.name));
    if let Some(v) = &ext.old_version {
        sql.push_str(&format!(" FROM {}", quote_ident_always(v)));
    }
    sql
}

pub fn drop_extension_sql(name: &str) -> String {
    format!("DROP EXTENSION IF EXISTS {}", quote_ident_always(name))
}

pub fn grant_database_sql(database: &str, user: &str, privileges: &[String]) -> Result<String, Error> {
    if privileges.is_empty() {
        return Err(Error::InvalidArgument(format!("no privileges to grant on {}", database)));
    }
    let mut normalized = Vec::with_capacity(privileges.len());
    for p in privileges {
        let up = p.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        if !DATABASE_PRIVILEGES.contains(&up.as_str()) {
            return Err(Error::InvalidArgument(format!("unknown database privilege: {}", p)));
        }
        normalized.push(up);
    }
    Ok(format!(
        "GRANT {} ON DATABASE {} TO {};",
        normalized.join(", "),
        quote_ident_always(database),
        quote_ident_always(user)
    ))
}
