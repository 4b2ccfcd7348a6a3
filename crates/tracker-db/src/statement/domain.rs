//! Domain vertex writes and the dependent-data cascade.

use tracker_core::models::domain::NewDomain;
use tracker_core::transaction::Statement;
use uuid::Uuid;

/// Create the domain vertex, or merge selectors into the existing one
/// with the same key.
pub fn upsert(domain: &NewDomain) -> Statement {
    Statement::new(
        "UPSERT type::record('domain', $id) SET \
         domain = $domain, hash = $hash, \
         selectors = array::union(selectors ?? [], $selectors), \
         archived = (archived ?? $archived), updated_at = time::now()",
    )
    .bind("id", domain.key.to_string())
    .bind("domain", domain.domain.clone())
    .bind("hash", domain.hash.clone())
    .bind("selectors", domain.selectors.clone())
    .bind("archived", domain.archived)
}

/// Field changes applied by a domain update.
#[derive(Debug, Clone, Default)]
pub struct DomainChanges {
    pub domain: Option<(String, String)>,
    pub selectors: Option<Vec<String>>,
    pub archived: Option<bool>,
}

impl DomainChanges {
    pub fn is_empty(&self) -> bool {
        self.domain.is_none() && self.selectors.is_none() && self.archived.is_none()
    }
}

/// Returns `None` when nothing changes.
pub fn update(key: Uuid, changes: &DomainChanges) -> Option<Statement> {
    if changes.is_empty() {
        return None;
    }
    let mut sets = Vec::new();
    if changes.domain.is_some() {
        sets.push("domain = $domain, hash = $hash");
    }
    if changes.selectors.is_some() {
        sets.push("selectors = $selectors");
    }
    if changes.archived.is_some() {
        sets.push("archived = $archived");
    }
    sets.push("updated_at = time::now()");

    let sql = format!(
        "UPDATE type::record('domain', $id) SET {}",
        sets.join(", ")
    );
    let mut statement = Statement::new(sql).bind("id", key.to_string());
    if let Some((name, hash)) = &changes.domain {
        statement = statement.bind("domain", name.clone()).bind("hash", hash.clone());
    }
    if let Some(selectors) = &changes.selectors {
        statement = statement.bind("selectors", selectors.clone());
    }
    if let Some(archived) = changes.archived {
        statement = statement.bind("archived", archived);
    }
    Some(statement)
}

pub fn set_archived(key: Uuid, archived: bool) -> Statement {
    Statement::new(
        "UPDATE type::record('domain', $id) SET archived = $archived, \
         updated_at = time::now()",
    )
    .bind("id", key.to_string())
    .bind("archived", archived)
}

/// Every step that removes a domain and the scan data hanging off it.
///
/// Order matters: web scans are found through the web edges, so they go
/// before the web vertices, and the domain vertex goes last.
pub fn cascade_delete(key: Uuid) -> Vec<Statement> {
    let id = key.to_string();
    let step = |sql: &str| Statement::new(sql).bind("domain", id.clone());
    vec![
        step(
            "DELETE web_scan WHERE id INSIDE (SELECT VALUE out FROM web_to_web_scans \
             WHERE in INSIDE (SELECT VALUE out FROM domains_web \
             WHERE in = type::record('domain', $domain)))",
        ),
        step(
            "DELETE web_to_web_scans WHERE in INSIDE (SELECT VALUE out FROM domains_web \
             WHERE in = type::record('domain', $domain))",
        ),
        step(
            "DELETE web WHERE id INSIDE (SELECT VALUE out FROM domains_web \
             WHERE in = type::record('domain', $domain))",
        ),
        step("DELETE domains_web WHERE in = type::record('domain', $domain)"),
        step(
            "DELETE dns WHERE id INSIDE (SELECT VALUE out FROM domains_dns \
             WHERE in = type::record('domain', $domain))",
        ),
        step("DELETE domains_dns WHERE in = type::record('domain', $domain)"),
        step("DELETE domains_to_selectors WHERE in = type::record('domain', $domain)"),
        step("DELETE favourite WHERE out = type::record('domain', $domain)"),
        step("DELETE claim WHERE out = type::record('domain', $domain)"),
        step("DELETE type::record('domain', $domain)"),
    ]
}

/// Steps that drop an organization's ownership of a domain together with
/// the DMARC summaries it aggregated.
pub fn ownership_cleanup(org_key: Uuid, domain_key: Uuid) -> Vec<Statement> {
    let domain = domain_key.to_string();
    vec![
        Statement::new(
            "DELETE dmarc_summary WHERE id INSIDE (SELECT VALUE out \
             FROM domains_to_dmarc_summaries WHERE in = type::record('domain', $domain))",
        )
        .bind("domain", domain.clone()),
        Statement::new(
            "DELETE domains_to_dmarc_summaries WHERE in = type::record('domain', $domain)",
        )
        .bind("domain", domain.clone()),
        Statement::new(
            "DELETE ownership WHERE in = type::record('organization', $org) \
             AND out = type::record('domain', $domain)",
        )
        .bind("org", org_key.to_string())
        .bind("domain", domain),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_ends_with_domain_vertex() {
        let steps = cascade_delete(Uuid::new_v4());
        assert!(steps[0].sql().starts_with("DELETE web_scan"));
        assert_eq!(
            steps.last().unwrap().sql(),
            "DELETE type::record('domain', $domain)"
        );
        let claim = steps.iter().position(|s| s.sql().starts_with("DELETE claim"));
        let web = steps.iter().position(|s| s.sql().starts_with("DELETE web "));
        assert!(web < claim);
    }

    #[test]
    fn ownership_cleanup_removes_summaries_before_edge() {
        let steps = ownership_cleanup(Uuid::new_v4(), Uuid::new_v4());
        assert!(steps[0].sql().starts_with("DELETE dmarc_summary"));
        assert!(steps[2].sql().starts_with("DELETE ownership"));
    }

    #[test]
    fn update_only_sets_requested_fields() {
        let stmt = update(
            Uuid::new_v4(),
            &DomainChanges {
                archived: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(stmt.sql().contains("archived = $archived"));
        assert!(!stmt.sql().contains("selectors"));
        assert!(update(Uuid::new_v4(), &DomainChanges::default()).is_none());
    }
}
