use std::collections::HashMap;

use crate::registry::BudgetMatch;

/// One line item of the federal budget (Bundeshaushalt) CSV.
/// `soll` is the planned amount in thousand euros.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetRow {
    pub einzelplan: String,
    pub kapitel: String,
    pub kapitel_text: String,
    pub titel: String,
    pub titel_text: String,
    pub soll: i64,
}

/// One line of a budget breakdown (next classification level down).
#[derive(Clone, Debug, PartialEq)]
pub struct BreakdownLine {
    pub label: String,
    pub description: String,
    pub amount: i64,
}

/// Parsed budget table with per-match aggregation.
#[derive(Debug, Default)]
pub struct BudgetTable {
    rows: Vec<BudgetRow>,
}

// Column positions in the published HH CSV.
const COL_EINZELPLAN: usize = 0;
const COL_KAPITEL: usize = 4;
const COL_KAPITEL_TEXT: usize = 5;
const COL_TITEL: usize = 6;
const COL_TITEL_TEXT: usize = 8;
const COL_SOLL: usize = 11;

const BREAKDOWN_LIMIT: usize = 10;

impl BudgetTable {
    /// Parse the semicolon-separated budget CSV. One header line, quoted
    /// fields, blank lines skipped. Unparsable amounts count as zero; the
    /// parse itself never fails.
    pub fn parse(csv: &str) -> BudgetTable {
        let rows = csv
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let parts: Vec<&str> = line.split(';').collect();
                let field = |idx: usize| {
                    parts
                        .get(idx)
                        .map(|s| s.replace('"', "").trim().to_string())
                        .unwrap_or_default()
                };
                BudgetRow {
                    einzelplan: field(COL_EINZELPLAN),
                    kapitel: field(COL_KAPITEL),
                    kapitel_text: field(COL_KAPITEL_TEXT),
                    titel: field(COL_TITEL),
                    titel_text: field(COL_TITEL_TEXT),
                    soll: field(COL_SOLL).parse().unwrap_or(0),
                }
            })
            .collect();
        BudgetTable { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn matching_rows<'a>(&'a self, m: &'a BudgetMatch) -> impl Iterator<Item = &'a BudgetRow> {
        self.rows.iter().filter(move |row| {
            if row.einzelplan != m.einzelplan {
                return false;
            }
            if let Some(kapitel) = &m.kapitel {
                if &row.kapitel != kapitel {
                    return false;
                }
            }
            if let Some(titel) = &m.titel {
                if &row.titel != titel {
                    return false;
                }
            }
            true
        })
    }

    /// Total planned amount for a match, summed over all matching rows.
    pub fn amount_for(&self, m: &BudgetMatch) -> i64 {
        self.matching_rows(m).map(|row| row.soll).sum()
    }

    /// Top line items one classification level below the match: a match at
    /// Einzelplan level breaks down by Kapitel, at Kapitel level by Titel.
    /// A match pinned to a Titel has nothing further to break down.
    pub fn breakdown_for(&self, m: &BudgetMatch) -> Option<Vec<BreakdownLine>> {
        let (group_label, by_titel) = if m.kapitel.is_none() {
            ("Kapitel", false)
        } else if m.titel.is_none() {
            ("Titel", true)
        } else {
            return None;
        };

        let mut grouped: HashMap<String, (i64, String)> = HashMap::new();
        for row in self.matching_rows(m) {
            let (code, text) = if by_titel {
                (&row.titel, &row.titel_text)
            } else {
                (&row.kapitel, &row.kapitel_text)
            };
            let key = if code.is_empty() {
                crate::registry::FALLBACK_GROUP.to_string()
            } else {
                code.clone()
            };
            let slot = grouped.entry(key).or_insert_with(|| (0, text.clone()));
            slot.0 += row.soll;
        }

        let mut lines: Vec<BreakdownLine> = grouped
            .into_iter()
            .map(|(code, (amount, description))| BreakdownLine {
                label: format!("{group_label} {code}"),
                description,
                amount,
            })
            .collect();
        lines.sort_by(|a, b| b.amount.cmp(&a.amount));
        lines.truncate(BREAKDOWN_LIMIT);
        Some(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OrgId;

    const SAMPLE: &str = "\
Einzelplan;EpText;Funktion;FktText;Kapitel;KapitelText;Titel;Zweck;TitelText;Flex;Ist;Soll
\"23\";\"BMZ\";;;\"2301\";\"Ministerium\";\"42201\";;\"Bezüge\";;0;1200
\"23\";\"BMZ\";;;\"2301\";\"Ministerium\";\"51101\";;\"Sachausgaben\";;0;300
\"23\";\"BMZ\";;;\"2310\";\"Entwicklungszusammenarbeit\";\"89603\";;\"Zuschüsse\";;0;8000
\"60\";\"Allg. Finanzverwaltung\";;;\"6002\";\"Zuweisungen\";\"68901\";;\"Vermischtes\";;0;450

\"60\";\"Allg. Finanzverwaltung\";;;\"6002\";\"Zuweisungen\";\"68902\";;\"Sonstiges\";;0;kaputt
";

    fn ep(einzelplan: &str) -> BudgetMatch {
        BudgetMatch {
            organisation_id: OrgId::Number(1),
            einzelplan: einzelplan.to_string(),
            kapitel: None,
            titel: None,
        }
    }

    #[test]
    fn parse_skips_header_and_blank_lines() {
        let table = BudgetTable::parse(SAMPLE);
        assert!(!table.is_empty());
        assert_eq!(table.amount_for(&ep("23")), 1200 + 300 + 8000);
    }

    #[test]
    fn unparsable_amounts_count_as_zero() {
        let table = BudgetTable::parse(SAMPLE);
        assert_eq!(table.amount_for(&ep("60")), 450);
    }

    #[test]
    fn kapitel_match_narrows_the_sum() {
        let table = BudgetTable::parse(SAMPLE);
        let m = BudgetMatch {
            kapitel: Some("2301".to_string()),
            ..ep("23")
        };
        assert_eq!(table.amount_for(&m), 1500);
    }

    #[test]
    fn titel_match_selects_a_single_row() {
        let table = BudgetTable::parse(SAMPLE);
        let m = BudgetMatch {
            kapitel: Some("2310".to_string()),
            titel: Some("89603".to_string()),
            ..ep("23")
        };
        assert_eq!(table.amount_for(&m), 8000);
    }

    #[test]
    fn unknown_einzelplan_sums_to_zero() {
        let table = BudgetTable::parse(SAMPLE);
        assert_eq!(table.amount_for(&ep("99")), 0);
    }

    #[test]
    fn einzelplan_match_breaks_down_by_kapitel() {
        let table = BudgetTable::parse(SAMPLE);
        let lines = table.breakdown_for(&ep("23")).unwrap();
        assert_eq!(lines.len(), 2);
        // Sorted by amount descending.
        assert_eq!(lines[0].label, "Kapitel 2310");
        assert_eq!(lines[0].description, "Entwicklungszusammenarbeit");
        assert_eq!(lines[0].amount, 8000);
        assert_eq!(lines[1].label, "Kapitel 2301");
        assert_eq!(lines[1].amount, 1500);
    }

    #[test]
    fn kapitel_match_breaks_down_by_titel() {
        let table = BudgetTable::parse(SAMPLE);
        let m = BudgetMatch {
            kapitel: Some("2301".to_string()),
            ..ep("23")
        };
        let lines = table.breakdown_for(&m).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].label, "Titel 42201");
        assert_eq!(lines[0].description, "Bezüge");
    }

    #[test]
    fn titel_match_has_no_breakdown() {
        let table = BudgetTable::parse(SAMPLE);
        let m = BudgetMatch {
            kapitel: Some("2301".to_string()),
            titel: Some("42201".to_string()),
            ..ep("23")
        };
        assert!(table.breakdown_for(&m).is_none());
    }
}
