//! Organization vertex writes.

use tracker_core::models::organization::{NewOrganization, OrgDetails, UpdateOrganization};
use tracker_core::transaction::Statement;
use uuid::Uuid;

const DETAIL_FIELDS: &str = "\
slug_en = $slug_en, slug_fr = $slug_fr, \
acronym_en = $acronym_en, acronym_fr = $acronym_fr, \
name_en = $name_en, name_fr = $name_fr, \
zone_en = $zone_en, zone_fr = $zone_fr, \
sector_en = $sector_en, sector_fr = $sector_fr, \
country_en = $country_en, country_fr = $country_fr, \
province_en = $province_en, province_fr = $province_fr, \
city_en = $city_en, city_fr = $city_fr";

fn bind_details(statement: Statement, suffix: &str, details: &OrgDetails) -> Statement {
    statement
        .bind(&format!("slug_{suffix}"), details.slug.clone())
        .bind(&format!("acronym_{suffix}"), details.acronym.clone())
        .bind(&format!("name_{suffix}"), details.name.clone())
        .bind(&format!("zone_{suffix}"), details.zone.clone())
        .bind(&format!("sector_{suffix}"), details.sector.clone())
        .bind(&format!("country_{suffix}"), details.country.clone())
        .bind(&format!("province_{suffix}"), details.province.clone())
        .bind(&format!("city_{suffix}"), details.city.clone())
}

fn external_id_clause(external_id: &Option<String>) -> &'static str {
    if external_id.is_some() {
        "external_id = $external_id"
    } else {
        "external_id = NONE"
    }
}

pub fn insert(org: &NewOrganization) -> Statement {
    let sql = format!(
        "CREATE type::record('organization', $id) SET \
         verified = $verified, externally_managed = $externally_managed, \
         {}, {DETAIL_FIELDS}",
        external_id_clause(&org.external_id),
    );
    let mut statement = Statement::new(sql)
        .bind("id", org.key.to_string())
        .bind("verified", org.verified)
        .bind("externally_managed", org.externally_managed);
    if let Some(external_id) = &org.external_id {
        statement = statement.bind("external_id", external_id.clone());
    }
    let statement = bind_details(statement, "en", &org.en);
    bind_details(statement, "fr", &org.fr)
}

pub fn update(key: Uuid, org: &UpdateOrganization) -> Statement {
    let sql = format!(
        "UPDATE type::record('organization', $id) SET \
         externally_managed = $externally_managed, {}, {DETAIL_FIELDS}, \
         updated_at = time::now()",
        external_id_clause(&org.external_id),
    );
    let mut statement = Statement::new(sql)
        .bind("id", key.to_string())
        .bind("externally_managed", org.externally_managed);
    if let Some(external_id) = &org.external_id {
        statement = statement.bind("external_id", external_id.clone());
    }
    let statement = bind_details(statement, "en", &org.en);
    bind_details(statement, "fr", &org.fr)
}

pub fn set_verified(key: Uuid, verified: bool) -> Statement {
    Statement::new(
        "UPDATE type::record('organization', $id) SET verified = $verified, \
         updated_at = time::now()",
    )
    .bind("id", key.to_string())
    .bind("verified", verified)
}

pub fn delete(key: Uuid) -> Statement {
    Statement::new("DELETE type::record('organization', $id)").bind("id", key.to_string())
}

pub fn delete_summaries(key: Uuid) -> Statement {
    Statement::new("DELETE organization_summary WHERE organization = $org")
        .bind("org", key.to_string())
}

pub fn delete_affiliations(key: Uuid) -> Statement {
    Statement::new("DELETE affiliation WHERE in = type::record('organization', $org)")
        .bind("org", key.to_string())
}

/// Any ownership edges the organization still holds.
pub fn delete_ownerships(key: Uuid) -> Statement {
    Statement::new("DELETE ownership WHERE in = type::record('organization', $org)")
        .bind("org", key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> OrgDetails {
        OrgDetails {
            name: name.into(),
            slug: name.to_lowercase(),
            ..Default::default()
        }
    }

    #[test]
    fn insert_binds_both_languages() {
        let stmt = insert(&NewOrganization {
            key: Uuid::new_v4(),
            verified: false,
            externally_managed: false,
            external_id: None,
            en: details("Treasury"),
            fr: details("Tresor"),
        });
        assert!(stmt.sql().contains("external_id = NONE"));
        assert!(stmt.bindings().iter().any(|(n, v)| n == "name_fr" && v == "Tresor"));
        assert!(stmt.bindings().iter().any(|(n, v)| n == "slug_en" && v == "treasury"));
    }

    #[test]
    fn update_binds_external_id_when_present() {
        let stmt = update(
            Uuid::new_v4(),
            &UpdateOrganization {
                externally_managed: true,
                external_id: Some("ext-1".into()),
                en: details("A"),
                fr: details("B"),
            },
        );
        assert!(stmt.sql().contains("external_id = $external_id"));
        assert!(stmt.bindings().iter().any(|(n, _)| n == "external_id"));
    }
}
