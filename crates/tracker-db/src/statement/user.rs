//! User vertex writes.

use tracker_core::models::user::{NewUser, UpdateUser};
use tracker_core::transaction::Statement;
use uuid::Uuid;

pub fn insert(user: &NewUser) -> Statement {
    Statement::new(
        "CREATE type::record('user', $id) SET \
         user_name = $user_name, display_name = $display_name, \
         password_hash = $password_hash, preferred_lang = $preferred_lang",
    )
    .bind("id", user.key.to_string())
    .bind("user_name", user.user_name.to_lowercase())
    .bind("display_name", user.display_name.clone())
    .bind("password_hash", user.password_hash.clone())
    .bind("preferred_lang", user.preferred_lang.as_str())
}

/// Partial update. Returns `None` when `update` changes nothing.
pub fn update(key: Uuid, update: &UpdateUser) -> Option<Statement> {
    if update.is_empty() {
        return None;
    }

    let mut sets: Vec<String> = Vec::new();
    let mut binds: Vec<(&str, serde_json::Value)> = Vec::new();

    if let Some(display_name) = &update.display_name {
        sets.push("display_name = $display_name".into());
        binds.push(("display_name", display_name.clone().into()));
    }
    if let Some(hash) = &update.password_hash {
        sets.push("password_hash = $password_hash".into());
        binds.push(("password_hash", hash.clone().into()));
    }
    if let Some(lang) = update.preferred_lang {
        sets.push("preferred_lang = $preferred_lang".into());
        binds.push(("preferred_lang", lang.as_str().into()));
    }
    if let Some(validated) = update.email_validated {
        sets.push("email_validated = $email_validated".into());
        binds.push(("email_validated", validated.into()));
    }
    if let Some(validated) = update.phone_validated {
        sets.push("phone_validated = $phone_validated".into());
        binds.push(("phone_validated", validated.into()));
    }
    if let Some(method) = update.tfa_send_method {
        sets.push("tfa_send_method = $tfa_send_method".into());
        binds.push(("tfa_send_method", method.as_str().into()));
    }
    if let Some(attempts) = update.failed_login_attempts {
        sets.push("failed_login_attempts = $failed_login_attempts".into());
        binds.push(("failed_login_attempts", attempts.into()));
    }
    match &update.refresh_info {
        Some(Some(info)) => {
            sets.push("refresh_id = $refresh_id".into());
            sets.push("refresh_expires_at = <datetime>$refresh_expires_at".into());
            sets.push("remember_me = $remember_me".into());
            binds.push(("refresh_id", info.refresh_id.clone().into()));
            binds.push(("refresh_expires_at", info.expires_at.to_rfc3339().into()));
            binds.push(("remember_me", info.remember_me.into()));
        }
        Some(None) => {
            sets.push("refresh_id = NONE".into());
            sets.push("refresh_expires_at = NONE".into());
            sets.push("remember_me = false".into());
        }
        None => {}
    }
    set_optional_string(&mut sets, &mut binds, "tfa_code", &update.tfa_code);
    set_optional_string(&mut sets, &mut binds, "phone_details", &update.phone_details);
    sets.push("updated_at = time::now()".into());

    let sql = format!(
        "UPDATE type::record('user', $id) SET {}",
        sets.join(", ")
    );
    let mut statement = Statement::new(sql).bind("id", key.to_string());
    for (name, value) in binds {
        statement = statement.bind(name, value);
    }
    Some(statement)
}

fn set_optional_string(
    sets: &mut Vec<String>,
    binds: &mut Vec<(&'static str, serde_json::Value)>,
    field: &'static str,
    value: &Option<Option<String>>,
) {
    match value {
        Some(Some(v)) => {
            sets.push(format!("{field} = ${field}"));
            binds.push((field, v.clone().into()));
        }
        Some(None) => sets.push(format!("{field} = NONE")),
        None => {}
    }
}

pub fn delete(key: Uuid) -> Statement {
    Statement::new("DELETE type::record('user', $id)").bind("id", key.to_string())
}

/// Drop every affiliation edge pointing at the user.
pub fn delete_affiliations(key: Uuid) -> Statement {
    Statement::new("DELETE affiliation WHERE out = type::record('user', $id)")
        .bind("id", key.to_string())
}

pub fn delete_favourites(key: Uuid) -> Statement {
    Statement::new("DELETE favourite WHERE in = type::record('user', $id)")
        .bind("id", key.to_string())
}
