use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::budget::BudgetTable;
use crate::wikidata::WikidataStore;

/// Group key for entries without a Ressort or Kategorie.
pub const FALLBACK_GROUP: &str = "Sonstige";

/// Organization id as exported upstream: numeric for most rows, free-form
/// text for a few legacy entries.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum OrgId {
    Number(u64),
    Text(String),
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrgId::Number(n) => write!(f, "{n}"),
            OrgId::Text(s) => f.write_str(s),
        }
    }
}

/// One row of `organizations-index.json` — the minimal record the grid and
/// treemap work from. Full details live in per-organization files.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "Organisation", default)]
    pub organisation: String,
    #[serde(rename = "OrganisationId", default)]
    pub organisation_id: Option<OrgId>,
    #[serde(rename = "OrganisationDisplay", default)]
    pub display: Option<String>,
    #[serde(rename = "OrganisationKurz", default)]
    pub kurz: Option<String>,
    #[serde(rename = "OrganisationKurzInoffiziell", default)]
    pub kurz_inoffiziell: Option<String>,
    #[serde(rename = "Kategorie", default)]
    pub kategorie: Option<String>,
    #[serde(rename = "Ressort", default)]
    pub ressort: Option<String>,
    #[serde(rename = "Ort", default)]
    pub ort: Option<String>,
    #[serde(rename = "Versteckt", default)]
    pub versteckt: bool,
    #[serde(rename = "hasWikidata", default)]
    pub has_wikidata: bool,
}

impl IndexEntry {
    /// Short label for grid tiles.
    pub fn tile_name(&self) -> &str {
        self.kurz
            .as_deref()
            .or(self.kurz_inoffiziell.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.organisation)
    }

    /// Label for treemap cells: the curated display name when present.
    pub fn cell_name(&self) -> &str {
        self.display
            .as_deref()
            .or(self.kurz.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.organisation)
    }

    /// A Ressort's own lead entity (e.g. the BMZ entry inside the BMZ group).
    pub fn is_ressort_lead(&self) -> bool {
        match (&self.kurz, &self.ressort) {
            (Some(kurz), Some(ressort)) => !kurz.is_empty() && kurz == ressort,
            _ => false,
        }
    }

    /// Key into the budget-match table: the id when present, else the name.
    pub fn match_key(&self) -> String {
        match &self.organisation_id {
            Some(id) => id.to_string(),
            None => self.organisation.clone(),
        }
    }

    /// Case-insensitive substring search over the fields users type.
    pub fn matches(&self, needle_lower: &str) -> bool {
        let hit = |field: Option<&str>| {
            field.is_some_and(|s| s.to_lowercase().contains(needle_lower))
        };
        self.organisation.to_lowercase().contains(needle_lower)
            || hit(self.kurz.as_deref())
            || hit(self.kurz_inoffiziell.as_deref())
            || hit(self.display.as_deref())
            || hit(self.ressort.as_deref())
            || hit(self.ort.as_deref())
    }
}

/// Mapping of an organization onto the federal budget classification.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BudgetMatch {
    #[serde(rename = "organisationId")]
    pub organisation_id: OrgId,
    pub einzelplan: String,
    #[serde(default)]
    pub kapitel: Option<String>,
    #[serde(default)]
    pub titel: Option<String>,
}

/// An additional service location of an organization.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EntityLocation {
    #[serde(rename = "Hauptadresse", default)]
    pub hauptadresse: Option<String>,
    #[serde(rename = "PLZ", default, deserialize_with = "loose_string")]
    pub plz: Option<String>,
    #[serde(rename = "Ort", default)]
    pub ort: Option<String>,
    #[serde(rename = "Bundesland", default)]
    pub bundesland: Option<String>,
}

/// Full per-organization record (`organizations/<slug>.json`). Only the
/// fields the detail view adds on top of the index are kept; the duplicated
/// index columns in the file are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Entity {
    #[serde(rename = "Organisation", default)]
    pub organisation: String,
    #[serde(rename = "Hauptadresse", default)]
    pub hauptadresse: Option<String>,
    #[serde(rename = "PLZ", default, deserialize_with = "loose_string")]
    pub plz: Option<String>,
    #[serde(rename = "Ort", default)]
    pub ort: Option<String>,
    #[serde(rename = "Bundesland", default)]
    pub bundesland: Option<String>,
    #[serde(rename = "Telefon", default, deserialize_with = "loose_string")]
    pub telefon: Option<String>,
    #[serde(rename = "Telefax", default, deserialize_with = "loose_string")]
    pub telefax: Option<String>,
    #[serde(rename = "E-Mail", default)]
    pub email: Option<String>,
    #[serde(rename = "Internetadresse", default)]
    pub internetadresse: Option<String>,
    #[serde(rename = "IstRessort", default)]
    pub ist_ressort: bool,
    #[serde(rename = "IstVerfassungsorgan", default)]
    pub ist_verfassungsorgan: bool,
    #[serde(default)]
    pub locations: Vec<EntityLocation>,
    /// Attached after load; not part of the stored record.
    #[serde(skip)]
    pub budget_match: Option<BudgetMatch>,
}

/// PLZ and phone fields appear both as strings and as bare numbers in the
/// exports; fold numbers into their string form.
fn loose_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

/// Everything loaded from one dataset folder.
pub struct Registry {
    pub entries: Vec<IndexEntry>,
    pub budget_matches: HashMap<String, BudgetMatch>,
    pub budget: BudgetTable,
    pub wikidata: WikidataStore,
    data_dir: PathBuf,
}

impl Registry {
    /// Load a dataset folder. The index is required; budget matches, the
    /// budget table and the Wikidata snapshot degrade to empty when missing.
    pub fn load(data_dir: &Path) -> Result<Registry> {
        let index_path = data_dir.join("organizations-index.json");
        let raw = fs::read_to_string(&index_path)
            .with_context(|| format!("read {}", index_path.display()))?;
        let all: Vec<IndexEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("parse {}", index_path.display()))?;
        let entries: Vec<IndexEntry> = all
            .into_iter()
            .filter(|e| !e.versteckt && !e.organisation.is_empty())
            .collect();
        log::info!("loaded {} visible entries from index", entries.len());

        let budget_matches = match fs::read_to_string(data_dir.join("budget_matches.json")) {
            Ok(raw) => match serde_json::from_str::<Vec<BudgetMatch>>(&raw) {
                Ok(matches) => matches
                    .into_iter()
                    .map(|m| (m.organisation_id.to_string(), m))
                    .collect(),
                Err(err) => {
                    log::warn!("budget_matches.json unreadable: {err}");
                    HashMap::new()
                }
            },
            Err(err) => {
                log::warn!("budget_matches.json missing: {err}");
                HashMap::new()
            }
        };

        let budget = match fs::read_to_string(data_dir.join("HH_2025.csv")) {
            Ok(raw) => BudgetTable::parse(&raw),
            Err(err) => {
                log::warn!("HH_2025.csv missing: {err}");
                BudgetTable::default()
            }
        };
        if budget.is_empty() {
            log::warn!("budget table is empty, treemap will have no data");
        }

        let wikidata = WikidataStore::load(&data_dir.join("wikidata.json"));
        if wikidata.is_empty() {
            log::warn!("no wikidata enrichment available");
        } else {
            log::info!("wikidata snapshot: {} entities", wikidata.len());
        }

        Ok(Registry {
            entries,
            budget_matches,
            budget,
            wikidata,
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Entries matching the query; all entries for a blank query.
    pub fn search(&self, query: &str) -> Vec<&IndexEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries.iter().filter(|e| e.matches(&needle)).collect()
    }

    pub fn budget_match_for(&self, entry: &IndexEntry) -> Option<&BudgetMatch> {
        self.budget_matches.get(&entry.match_key())
    }

    /// Allocated budget for an entry, summed from the budget table.
    pub fn budget_amount_for(&self, entry: &IndexEntry) -> Option<i64> {
        self.budget_match_for(entry)
            .map(|m| self.budget.amount_for(m))
    }

    /// Read the full per-organization record and attach its budget match.
    pub fn load_full_entity(&self, entry: &IndexEntry) -> Result<Entity> {
        let path = self
            .data_dir
            .join("organizations")
            .join(format!("{}.json", entity_file_stem(entry)));
        let raw =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let mut entity: Entity =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        entity.budget_match = self.budget_match_for(entry).cloned();
        Ok(entity)
    }
}

/// File stem of a per-organization record, mirroring the upstream exporter:
/// accent folding, word characters only, single hyphens, lowercased, capped
/// at 50 chars, numeric id suffix when one exists.
pub fn entity_file_stem(entry: &IndexEntry) -> String {
    let name = entry
        .kurz
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            if entry.organisation.is_empty() {
                entry.display.as_deref().unwrap_or("org")
            } else {
                &entry.organisation
            }
        });

    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        // Covers the accents that occur in the registry; everything else
        // non-ASCII (including ß) drops out like in the upstream NFKD pass.
        let ch = match ch {
            'ä' | 'Ä' => 'a',
            'ö' | 'Ö' => 'o',
            'ü' | 'Ü' => 'u',
            'é' | 'è' | 'ê' => 'e',
            'á' | 'à' | 'â' => 'a',
            other => other,
        };
        if ch.is_whitespace() || ch == '-' {
            pending_hyphen = !slug.is_empty();
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.push(ch.to_ascii_lowercase());
        }
    }
    slug.truncate(50);

    match &entry.organisation_id {
        Some(id) => format!("{slug}-{id}"),
        None => slug,
    }
}

/// How the directory grid groups its entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupBy {
    Ressort,
    Kategorie,
}

/// One rendered group of the directory grid.
pub struct EntityGroup<'a> {
    pub key: String,
    pub label: String,
    pub entries: Vec<&'a IndexEntry>,
}

/// Group, order and label entries for the grid.
pub fn group_entries<'a>(entries: &[&'a IndexEntry], mode: GroupBy) -> Vec<EntityGroup<'a>> {
    let mut by_key: HashMap<String, Vec<&IndexEntry>> = HashMap::new();
    for &entry in entries {
        let key = match mode {
            GroupBy::Ressort => entry.ressort.as_deref(),
            GroupBy::Kategorie => entry.kategorie.as_deref(),
        };
        let key = key.filter(|k| !k.is_empty()).unwrap_or(FALLBACK_GROUP);
        by_key.entry(key.to_string()).or_default().push(entry);
    }

    let mut groups: Vec<EntityGroup<'a>> = by_key
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(|a, b| {
                // The Ressort's lead entity heads its group.
                b.is_ressort_lead()
                    .cmp(&a.is_ressort_lead())
                    .then_with(|| a.organisation.cmp(&b.organisation))
            });
            let label = members
                .iter()
                .find(|e| e.is_ressort_lead())
                .map(|lead| lead.organisation.clone())
                .unwrap_or_else(|| key.clone());
            EntityGroup {
                key,
                label,
                entries: members,
            }
        })
        .collect();

    match mode {
        GroupBy::Ressort => {
            groups.sort_by(|a, b| {
                ressort_rank(&a.key)
                    .cmp(&ressort_rank(&b.key))
                    .then_with(|| a.key.cmp(&b.key))
            });
        }
        GroupBy::Kategorie => {
            groups.sort_by(|a, b| {
                kategorie_rank(&a.key)
                    .cmp(&kategorie_rank(&b.key))
                    .then_with(|| a.key.cmp(&b.key))
            });
        }
    }
    groups
}

/// Chancellery first, culture & media and the catch-all bucket last.
fn ressort_rank(key: &str) -> u8 {
    match key {
        "BKAmt" => 0,
        "BKM" => 2,
        FALLBACK_GROUP => 3,
        _ => 1,
    }
}

/// Constitutional organs ahead of ministries ahead of subordinate agencies.
fn kategorie_rank(key: &str) -> u8 {
    match key {
        "Verfassungsorgan" => 0,
        "Oberste Bundesbehörde" => 1,
        "Bundesoberbehörde" => 2,
        "Bundesmittelbehörde" => 3,
        "Bundesunterbehörde" => 4,
        FALLBACK_GROUP => 6,
        _ => 5,
    }
}

/// Distinct Kategorie values with entry counts, in grid order.
pub fn categories_with_counts(entries: &[IndexEntry]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        let key = entry
            .kategorie
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(FALLBACK_GROUP);
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, n)| (k.to_string(), n))
        .collect();
    out.sort_by(|a, b| {
        kategorie_rank(&a.0)
            .cmp(&kategorie_rank(&b.0))
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kurz: Option<&str>, ressort: Option<&str>) -> IndexEntry {
        IndexEntry {
            organisation: name.to_string(),
            kurz: kurz.map(str::to_string),
            ressort: ressort.map(str::to_string),
            ..IndexEntry::default()
        }
    }

    #[test]
    fn index_parse_maps_german_field_names() {
        let raw = r#"[{
            "Organisation": "Bundesministerium der Finanzen",
            "OrganisationId": 42,
            "OrganisationKurz": "BMF",
            "Kategorie": "Oberste Bundesbehörde",
            "Ressort": "BMF",
            "Versteckt": false,
            "hasWikidata": true
        }]"#;
        let entries: Vec<IndexEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.organisation, "Bundesministerium der Finanzen");
        assert_eq!(e.organisation_id, Some(OrgId::Number(42)));
        assert_eq!(e.kurz.as_deref(), Some("BMF"));
        assert!(e.has_wikidata);
        assert!(e.is_ressort_lead());
        assert_eq!(e.match_key(), "42");
    }

    #[test]
    fn string_org_ids_survive() {
        let raw = r#"{"Organisation": "Altfall", "OrganisationId": "alt-7"}"#;
        let e: IndexEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(e.organisation_id, Some(OrgId::Text("alt-7".into())));
        assert_eq!(e.match_key(), "alt-7");
    }

    #[test]
    fn search_matches_short_name_and_place() {
        let mut e = entry("Umweltbundesamt", Some("UBA"), Some("BMUV"));
        e.ort = Some("Dessau-Roßlau".to_string());
        assert!(e.matches("uba"));
        assert!(e.matches("umwelt"));
        assert!(e.matches("dessau"));
        assert!(e.matches("bmuv"));
        assert!(!e.matches("bahn"));
    }

    #[test]
    fn file_stem_folds_umlauts_and_appends_id() {
        let mut e = entry(
            "Bundesanstalt für Straßenwesen",
            Some("BASt"),
            None,
        );
        e.organisation_id = Some(OrgId::Number(17));
        assert_eq!(entity_file_stem(&e), "bast-17");

        e.kurz = None;
        // ß drops, umlaut folds, spaces become single hyphens.
        assert_eq!(entity_file_stem(&e), "bundesanstalt-fur-straenwesen-17");
    }

    #[test]
    fn file_stem_collapses_hyphen_runs_and_caps_length() {
        let mut e = entry("A  -  B", None, None);
        assert_eq!(entity_file_stem(&e), "a-b");

        e.organisation = "x".repeat(80);
        assert_eq!(entity_file_stem(&e).len(), 50);
    }

    #[test]
    fn grouping_orders_chancellery_first_and_catch_all_last() {
        let entries = vec![
            entry("Zentrale Stelle", None, None),
            entry("Bundesministerium für Verkehr", Some("BMV"), Some("BMV")),
            entry("Kulturstaatsministerin", Some("BKM"), Some("BKM")),
            entry("Bundeskanzleramt", Some("BKAmt"), Some("BKAmt")),
            entry("Bundesamt für Justiz", Some("BfJ"), Some("BMJ")),
        ];
        let refs: Vec<&IndexEntry> = entries.iter().collect();
        let groups = group_entries(&refs, GroupBy::Ressort);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["BKAmt", "BMJ", "BMV", "BKM", "Sonstige"]);
    }

    #[test]
    fn ressort_lead_heads_its_group_and_labels_it() {
        let entries = vec![
            entry("Auswärtiges Institut", Some("AI"), Some("AA")),
            entry("Auswärtiges Amt", Some("AA"), Some("AA")),
            entry("Akademie des Auswärtigen Dienstes", None, Some("AA")),
        ];
        let refs: Vec<&IndexEntry> = entries.iter().collect();
        let groups = group_entries(&refs, GroupBy::Ressort);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.label, "Auswärtiges Amt");
        assert_eq!(group.entries[0].organisation, "Auswärtiges Amt");
        // Remaining members alphabetical.
        assert_eq!(
            group.entries[1].organisation,
            "Akademie des Auswärtigen Dienstes"
        );
    }

    #[test]
    fn kategorie_grouping_ranks_constitutional_organs_first() {
        let mut a = entry("Bundesverfassungsgericht", Some("BVerfG"), None);
        a.kategorie = Some("Verfassungsorgan".to_string());
        let mut b = entry("Umweltbundesamt", Some("UBA"), None);
        b.kategorie = Some("Bundesoberbehörde".to_string());
        let c = entry("Irgendwas", None, None);

        let entries = vec![b.clone(), c.clone(), a.clone()];
        let refs: Vec<&IndexEntry> = entries.iter().collect();
        let groups = group_entries(&refs, GroupBy::Kategorie);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Verfassungsorgan", "Bundesoberbehörde", "Sonstige"]
        );
    }

    #[test]
    fn budget_match_parses_with_optional_levels() {
        let raw = r#"[
            {"organisationId": "12", "einzelplan": "23"},
            {"organisationId": 9, "einzelplan": "60", "kapitel": "6002", "titel": "68901"}
        ]"#;
        let matches: Vec<BudgetMatch> = serde_json::from_str(raw).unwrap();
        assert_eq!(matches[0].kapitel, None);
        assert_eq!(matches[1].organisation_id, OrgId::Number(9));
        assert_eq!(matches[1].titel.as_deref(), Some("68901"));
    }

    #[test]
    fn entity_tolerates_numeric_plz_and_phone() {
        let raw = r#"{
            "Organisation": "Testamt",
            "PLZ": 53113,
            "Telefon": 228990,
            "E-Mail": "poststelle@test.bund.de"
        }"#;
        let e: Entity = serde_json::from_str(raw).unwrap();
        assert_eq!(e.plz.as_deref(), Some("53113"));
        assert_eq!(e.telefon.as_deref(), Some("228990"));
        assert_eq!(e.email.as_deref(), Some("poststelle@test.bund.de"));
    }
}
