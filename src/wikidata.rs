use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

/// One stored Wikidata item, as snapshotted by the data pipeline: the raw
/// labels/descriptions/sitelinks/claims plus the labels and claims of every
/// entity the item links to (leaders, parties, parent organizations).
#[derive(Debug, Default, Deserialize)]
pub struct WikidataEntity {
    #[serde(default)]
    pub qid: String,
    #[serde(default)]
    pub data: WikidataDoc,
    #[serde(default)]
    pub referenced_entities: HashMap<String, ReferencedEntity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WikidataDoc {
    #[serde(default)]
    pub labels: HashMap<String, LangValue>,
    #[serde(default)]
    pub descriptions: HashMap<String, LangValue>,
    #[serde(default)]
    pub sitelinks: HashMap<String, Sitelink>,
    #[serde(default)]
    pub claims: HashMap<String, Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LangValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sitelink {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferencedEntity {
    #[serde(default)]
    pub labels: HashMap<String, LangValue>,
    #[serde(default)]
    pub descriptions: HashMap<String, LangValue>,
    #[serde(default)]
    pub claims: HashMap<String, Vec<Value>>,
}

/// The whole snapshot, keyed by organization id.
#[derive(Debug, Default)]
pub struct WikidataStore {
    entities: HashMap<String, WikidataEntity>,
}

impl WikidataStore {
    /// Read the snapshot file; an unreadable or missing snapshot degrades to
    /// an empty store (entities simply show no enrichment).
    pub fn load(path: &Path) -> WikidataStore {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("wikidata snapshot missing: {err}");
                return WikidataStore::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entities) => WikidataStore { entities },
            Err(err) => {
                log::warn!("wikidata snapshot unreadable: {err}");
                WikidataStore::default()
            }
        }
    }

    pub fn get(&self, org_id: &str) -> Option<&WikidataEntity> {
        self.entities.get(org_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// A linked item resolved through `referenced_entities`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkedItem {
    pub name: String,
    pub qid: String,
}

/// A social media presence with an optional follower count.
#[derive(Clone, Debug, PartialEq)]
pub struct SocialProfile {
    pub platform: &'static str,
    pub url: String,
    pub followers: Option<i64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmployeeCount {
    pub count: i64,
    pub year: Option<String>,
}

/// The incumbent head of the organization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Leader {
    pub name: String,
    pub qid: String,
    pub description: Option<String>,
    pub since: Option<String>,
    pub party: Option<String>,
    pub gender: Option<&'static str>,
    pub birth_date: Option<String>,
    pub image: Option<String>,
}

impl WikidataEntity {
    pub fn label(&self, lang: &str) -> Option<&str> {
        self.data.labels.get(lang).map(|v| v.value.as_str())
    }

    pub fn description(&self, lang: &str) -> Option<&str> {
        self.data.descriptions.get(lang).map(|v| v.value.as_str())
    }

    /// Image of the organization (P18) as a Commons file URL.
    pub fn image_url(&self) -> Option<String> {
        snak_str(first_claim(&self.data.claims, "P18")?).map(|f| commons_file_url(f, 800))
    }

    /// Organization logo (P154) as a Commons file URL.
    pub fn logo_url(&self) -> Option<String> {
        snak_str(first_claim(&self.data.claims, "P154")?).map(|f| commons_file_url(f, 400))
    }

    /// Founding year (P571).
    pub fn inception_year(&self) -> Option<String> {
        snak_time_year(first_claim(&self.data.claims, "P571")?)
    }

    /// Official website (P856).
    pub fn website(&self) -> Option<&str> {
        snak_str(first_claim(&self.data.claims, "P856")?)
    }

    /// Contact address from P968, without the mailto: scheme.
    pub fn email(&self) -> Option<&str> {
        snak_str(first_claim(&self.data.claims, "P968")?)
            .map(|mail| mail.strip_prefix("mailto:").unwrap_or(mail))
    }

    /// Wikipedia article URL from the sitelinks.
    pub fn wikipedia_url(&self, lang: &str) -> Option<String> {
        let sitelink = self.data.sitelinks.get(&format!("{lang}wiki"))?;
        let title = sitelink.title.replace(' ', "_");
        Some(format!(
            "https://{lang}.wikipedia.org/wiki/{}",
            urlencoding::encode(&title)
        ))
    }

    pub fn wikidata_url(&self) -> String {
        format!("https://www.wikidata.org/wiki/{}", self.qid)
    }

    /// What the organization is an instance of (P31), e.g. "Bundesamt".
    pub fn instance_of(&self) -> Option<&str> {
        let id = snak_entity_id(first_claim(&self.data.claims, "P31")?)?;
        self.referenced_label(id)
    }

    /// Parent organization (P749).
    pub fn parent_organization(&self) -> Option<LinkedItem> {
        self.linked_item(first_claim(&self.data.claims, "P749")?)
    }

    /// Subsidiaries (P355).
    pub fn subsidiaries(&self) -> Vec<LinkedItem> {
        self.data
            .claims
            .get("P355")
            .into_iter()
            .flatten()
            .filter_map(|claim| self.linked_item(claim))
            .collect()
    }

    /// Employee count (P1128) with its point-in-time year.
    pub fn employee_count(&self) -> Option<EmployeeCount> {
        let claim = first_claim(&self.data.claims, "P1128")?;
        let count = snak_amount(claim)?;
        let year = qualifier_time_year(claim, "P585");
        Some(EmployeeCount { count, year })
    }

    /// All linked social media profiles, with follower counts mined from the
    /// P8687 qualifier claims (highest count per platform wins).
    pub fn social_media(&self) -> Vec<SocialProfile> {
        // (platform, handle property, follower qualifier, url prefix)
        const PLATFORMS: [(&str, &str, &str, &str); 6] = [
            ("Twitter", "P2002", "P6552", "https://twitter.com/"),
            ("Facebook", "P2013", "P2013", "https://facebook.com/"),
            ("Instagram", "P2003", "P2003", "https://instagram.com/"),
            ("YouTube", "P2397", "P2397", "https://youtube.com/channel/"),
            ("LinkedIn", "P4264", "P4264", "https://linkedin.com/company/"),
            ("Bluesky", "P12361", "P12361", "https://bsky.app/profile/"),
        ];

        let mut followers: HashMap<&str, i64> = HashMap::new();
        for claim in self.data.claims.get("P8687").into_iter().flatten() {
            let Some(count) = snak_amount(claim) else {
                continue;
            };
            let Some(qualifiers) = claim.get("qualifiers").and_then(Value::as_object) else {
                continue;
            };
            for (platform, _, qualifier, _) in PLATFORMS {
                if qualifiers.contains_key(qualifier) {
                    let slot = followers.entry(platform).or_insert(0);
                    *slot = (*slot).max(count);
                }
            }
        }

        PLATFORMS
            .into_iter()
            .filter_map(|(platform, prop, _, prefix)| {
                let handle = snak_str(first_claim(&self.data.claims, prop)?)?;
                Some(SocialProfile {
                    platform,
                    url: format!("{prefix}{handle}"),
                    followers: followers.get(platform).copied(),
                })
            })
            .collect()
    }

    /// The incumbent leader: the first P488 claim without an end-date
    /// qualifier, resolved through the referenced entities.
    pub fn current_leader(&self) -> Option<Leader> {
        for claim in self.data.claims.get("P488")? {
            if claim
                .get("qualifiers")
                .and_then(|q| q.get("P582"))
                .is_some()
            {
                continue; // past leader
            }
            let Some(person_id) = snak_entity_id(claim) else {
                continue;
            };
            let Some(person) = self.referenced_entities.get(person_id) else {
                continue;
            };
            let Some(name) = person.labels.get("de").map(|v| v.value.clone()) else {
                continue;
            };

            let party = first_claim(&person.claims, "P102")
                .and_then(snak_entity_id)
                .and_then(|id| self.referenced_label(id))
                .map(str::to_string);
            let gender = first_claim(&person.claims, "P21")
                .and_then(snak_entity_id)
                .and_then(|id| self.referenced_label(id))
                .and_then(gender_short);
            let birth_date = first_claim(&person.claims, "P569")
                .and_then(snak_time)
                .and_then(format_birth_date);
            let image = first_claim(&person.claims, "P18")
                .and_then(snak_str)
                .map(|f| commons_file_url(f, 400));

            return Some(Leader {
                name,
                qid: person_id.to_string(),
                description: person.descriptions.get("de").map(|v| v.value.clone()),
                since: qualifier_time_year(claim, "P580"),
                party,
                gender,
                birth_date,
                image,
            });
        }
        None
    }

    fn referenced_label(&self, qid: &str) -> Option<&str> {
        self.referenced_entities
            .get(qid)?
            .labels
            .get("de")
            .map(|v| v.value.as_str())
    }

    fn linked_item(&self, claim: &Value) -> Option<LinkedItem> {
        let qid = snak_entity_id(claim)?;
        let name = self.referenced_label(qid)?;
        Some(LinkedItem {
            name: name.to_string(),
            qid: qid.to_string(),
        })
    }
}

// --- Claim plumbing ---

fn first_claim<'a>(claims: &'a HashMap<String, Vec<Value>>, prop: &str) -> Option<&'a Value> {
    claims.get(prop)?.first()
}

fn snak_value(claim: &Value) -> Option<&Value> {
    claim.get("mainsnak")?.get("datavalue")?.get("value")
}

fn snak_str(claim: &Value) -> Option<&str> {
    snak_value(claim)?.as_str()
}

fn snak_entity_id(claim: &Value) -> Option<&str> {
    snak_value(claim)?.get("id")?.as_str()
}

fn snak_time(claim: &Value) -> Option<&str> {
    snak_value(claim)?.get("time")?.as_str()
}

fn snak_time_year(claim: &Value) -> Option<String> {
    snak_time(claim).and_then(year_of)
}

/// Wikidata amounts carry an explicit sign ("+1234"); counts may also be
/// stored with a decimal part.
fn snak_amount(claim: &Value) -> Option<i64> {
    let amount = snak_value(claim)?.get("amount")?.as_str()?;
    amount
        .trim_start_matches('+')
        .parse::<f64>()
        .ok()
        .map(|a| a as i64)
}

fn qualifier_time_year(claim: &Value, prop: &str) -> Option<String> {
    claim
        .get("qualifiers")?
        .get(prop)?
        .get(0)?
        .get("datavalue")?
        .get("value")?
        .get("time")?
        .as_str()
        .and_then(year_of)
}

/// Year of a Wikidata time literal like "+1917-00-00T00:00:00Z".
fn year_of(time: &str) -> Option<String> {
    let digits: String = time
        .trim_start_matches('+')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    (digits.len() == 4).then_some(digits)
}

/// "+1962-01-24T00:00:00Z" -> "24.1.1962" (day-first, no leading zeros).
fn format_birth_date(time: &str) -> Option<String> {
    let date = time.trim_start_matches('+').get(..10)?;
    let mut parts = date.split('-');
    let year: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if month == 0 || day == 0 {
        return None;
    }
    Some(format!("{day}.{month}.{year}"))
}

fn gender_short(label: &str) -> Option<&'static str> {
    match label {
        "männlich" => Some("m"),
        "weiblich" => Some("w"),
        "divers" => Some("d"),
        _ => None,
    }
}

/// Wikimedia Commons thumbnail URL for a file claim value.
fn commons_file_url(filename: &str, width: u32) -> String {
    let encoded = urlencoding::encode(&filename.replace(' ', "_")).into_owned();
    format!("https://commons.wikimedia.org/wiki/Special:FilePath/{encoded}?width={width}")
}
