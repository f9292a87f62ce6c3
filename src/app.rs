use crate::budget::BreakdownLine;
use crate::registry::{
    categories_with_counts, group_entries, GroupBy, IndexEntry, Registry, FALLBACK_GROUP,
};
use crate::treemap;
use crate::wikidata::{Leader, LinkedItem, SocialProfile};
use eframe::egui;
use std::collections::BTreeSet;
use std::path::PathBuf;

// --- Layout constants ---
/// Logical treemap canvas; cells are mapped into the available panel rect.
const CANVAS: f32 = 100.0;
/// Minimum cell size (canvas units) before a label is drawn.
const LABEL_MIN_W: f32 = 5.0;
const LABEL_MIN_H: f32 = 3.0;
const DEFAULT_DATA_DIR: &str = "data";

// --- Cached treemap cell ---
#[derive(Clone)]
struct TreemapCell {
    /// Canvas-space rect (0..100 on both axes).
    rect: treemap::Rect,
    entry_idx: usize,
    amount: i64,
    color_index: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum View {
    Directory,
    Budget,
}

/// Everything the detail window shows, resolved up front so the window
/// itself renders without touching the registry.
struct DetailData {
    organisation: String,
    kurz: Option<String>,
    kategorie: Option<String>,
    ressort: Option<String>,
    ist_ressort: bool,
    ist_verfassungsorgan: bool,
    description: Option<String>,
    instance_of: Option<String>,
    inception: Option<String>,
    employees: Option<String>,
    leader: Option<Leader>,
    parent: Option<LinkedItem>,
    subsidiaries: Vec<LinkedItem>,
    address: Vec<String>,
    extra_locations: Vec<String>,
    contact: Vec<(&'static str, String)>,
    website: Option<String>,
    wikipedia_url: Option<String>,
    wikidata_url: Option<String>,
    image_url: Option<String>,
    logo_url: Option<String>,
    social: Vec<SocialProfile>,
    budget_amount: Option<i64>,
    budget_source: Option<String>,
    budget_breakdown: Vec<BreakdownLine>,
    record_error: Option<String>,
}

// --- Main app ---
pub struct BundViewApp {
    // Dataset state
    registry: Option<Registry>,
    loading: bool,
    load_receiver: Option<std::sync::mpsc::Receiver<anyhow::Result<Registry>>>,
    load_error: Option<String>,
    dataset_generation: u64,

    // Filters
    view: View,
    search_query: String,
    grouping: GroupBy,
    all_categories: Vec<(String, usize)>,
    active_categories: BTreeSet<String>,

    // Treemap cache — recomputed when the dataset generation changes
    treemap_cells: Vec<TreemapCell>,
    treemap_total: i64,
    treemap_generation: u64,
    hovered_cell: Option<usize>,

    // Detail window
    detail: Option<DetailData>,
}

impl BundViewApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self {
            registry: None,
            loading: false,
            load_receiver: None,
            load_error: None,
            dataset_generation: 0,
            view: View::Directory,
            search_query: String::new(),
            grouping: GroupBy::Ressort,
            all_categories: Vec::new(),
            active_categories: BTreeSet::new(),
            treemap_cells: Vec::new(),
            treemap_total: 0,
            treemap_generation: u64::MAX,
            hovered_cell: None,
            detail: None,
        };

        let default_dir = PathBuf::from(DEFAULT_DATA_DIR);
        if default_dir.is_dir() {
            app.start_load(default_dir);
        }
        app
    }

    fn start_load(&mut self, path: PathBuf) {
        log::info!("loading dataset from {}", path.display());
        self.loading = true;
        self.load_error = None;
        self.detail = None;

        let (tx, rx) = std::sync::mpsc::channel();
        self.load_receiver = Some(rx);

        std::thread::spawn(move || {
            let result = Registry::load(&path);
            let _ = tx.send(result);
        });
    }

    fn poll_load(&mut self) {
        let Some(rx) = &self.load_receiver else {
            return;
        };
        if let Ok(result) = rx.try_recv() {
            self.loading = false;
            self.load_receiver = None;
            match result {
                Ok(registry) => {
                    self.all_categories = categories_with_counts(&registry.entries);
                    self.active_categories =
                        self.all_categories.iter().map(|(k, _)| k.clone()).collect();
                    self.registry = Some(registry);
                    self.dataset_generation += 1;
                    self.search_query.clear();
                }
                Err(err) => {
                    log::warn!("dataset load failed: {err:#}");
                    self.load_error = Some(format!("{err:#}"));
                }
            }
        }
    }

    fn reset_filters(&mut self) {
        self.search_query.clear();
        self.active_categories = self.all_categories.iter().map(|(k, _)| k.clone()).collect();
    }

    fn filters_active(&self) -> bool {
        !self.search_query.trim().is_empty()
            || self.active_categories.len() != self.all_categories.len()
    }

    /// Entries passing search and category filters, in index order.
    fn visible_entries<'a>(&self, registry: &'a Registry) -> Vec<&'a IndexEntry> {
        registry
            .search(&self.search_query)
            .into_iter()
            .filter(|e| {
                let kategorie = e
                    .kategorie
                    .as_deref()
                    .filter(|k| !k.is_empty())
                    .unwrap_or(FALLBACK_GROUP);
                self.active_categories.contains(kategorie)
            })
            .collect()
    }

    fn ensure_treemap(&mut self) {
        if self.treemap_generation == self.dataset_generation {
            return;
        }
        let Some(registry) = &self.registry else {
            return;
        };

        // Budget-matched entries with a non-zero amount, largest first.
        let mut weighted: Vec<(i64, usize)> = registry
            .entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let amount = registry.budget_amount_for(entry)?;
                (amount > 0).then_some((amount, idx))
            })
            .collect();
        weighted.sort_by(|a, b| b.0.cmp(&a.0));

        let total: i64 = weighted.iter().map(|(amount, _)| amount).sum();
        let items: Vec<treemap::WeightedItem<(usize, i64, usize)>> = weighted
            .into_iter()
            .enumerate()
            .map(|(order, (amount, idx))| treemap::WeightedItem {
                value: amount as f64,
                payload: (idx, amount, order),
            })
            .collect();

        let cells = treemap::layout(
            items,
            treemap::Rect {
                x: 0.0,
                y: 0.0,
                width: CANVAS,
                height: CANVAS,
            },
        );

        self.treemap_cells = cells
            .into_iter()
            .map(|placed| TreemapCell {
                rect: placed.rect,
                entry_idx: placed.payload.0,
                amount: placed.payload.1,
                color_index: placed.payload.2,
            })
            .collect();
        self.treemap_total = total;
        self.treemap_generation = self.dataset_generation;
        self.hovered_cell = None;
        log::info!(
            "treemap rebuilt: {} budget-matched entries",
            self.treemap_cells.len()
        );
    }

    /// Resolve everything the detail window needs for one entry.
    fn open_detail(&mut self, entry: &IndexEntry) {
        let Some(registry) = &self.registry else {
            return;
        };

        let (entity, record_error) = match registry.load_full_entity(entry) {
            Ok(entity) => (Some(entity), None),
            Err(err) => {
                log::warn!("record for {} unavailable: {err:#}", entry.organisation);
                (None, Some(format!("{err:#}")))
            }
        };

        // The index says which entries have a snapshot at all.
        let wikidata = if entry.has_wikidata {
            registry.wikidata.get(&entry.match_key())
        } else {
            None
        };

        let mut address = Vec::new();
        let mut extra_locations = Vec::new();
        let mut contact = Vec::new();
        let mut website = None;
        let mut ist_ressort = false;
        let mut ist_verfassungsorgan = false;
        if let Some(entity) = &entity {
            if let Some(street) = entity.hauptadresse.as_deref().filter(|s| !s.is_empty()) {
                address.push(street.to_string());
            }
            let city = [entity.plz.as_deref(), entity.ort.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !city.is_empty() {
                address.push(city);
            }
            if let Some(land) = entity.bundesland.as_deref().filter(|s| !s.is_empty()) {
                address.push(land.to_string());
            }
            for loc in &entity.locations {
                let line = [
                    loc.hauptadresse.as_deref(),
                    loc.plz.as_deref(),
                    loc.ort.as_deref(),
                    loc.bundesland.as_deref(),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
                if !line.is_empty() {
                    extra_locations.push(line);
                }
            }
            for (label, value) in [
                ("Telefon", &entity.telefon),
                ("Telefax", &entity.telefax),
                ("E-Mail", &entity.email),
            ] {
                if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                    contact.push((label, value.to_string()));
                }
            }
            website = entity.internetadresse.clone().filter(|s| !s.is_empty());
            ist_ressort = entity.ist_ressort;
            ist_verfassungsorgan = entity.ist_verfassungsorgan;
        }
        if !contact.iter().any(|(label, _)| *label == "E-Mail") {
            if let Some(mail) = wikidata.and_then(|wd| wd.email()) {
                contact.push(("E-Mail", mail.to_string()));
            }
        }

        // Matches attached to the full record win over the index lookup.
        let budget_match = entity
            .as_ref()
            .and_then(|e| e.budget_match.as_ref())
            .or_else(|| registry.budget_match_for(entry));
        let budget_amount = budget_match.map(|m| registry.budget.amount_for(m));
        let budget_source = budget_match.map(|m| {
            let mut source = format!("Einzelplan {}", m.einzelplan);
            if let Some(kapitel) = &m.kapitel {
                source.push_str(&format!(" • Kapitel {kapitel}"));
            }
            if let Some(titel) = &m.titel {
                source.push_str(&format!(" • Titel {titel}"));
            }
            source
        });
        let budget_breakdown = budget_match
            .and_then(|m| registry.budget.breakdown_for(m))
            .unwrap_or_default();

        let organisation = entity
            .as_ref()
            .map(|e| e.organisation.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| entry.organisation.clone());

        self.detail = Some(DetailData {
            organisation,
            kurz: entry
                .kurz
                .clone()
                .or_else(|| entry.kurz_inoffiziell.clone())
                .filter(|s| !s.is_empty()),
            kategorie: entry.kategorie.clone().filter(|s| !s.is_empty()),
            ressort: entry.ressort.clone().filter(|s| !s.is_empty()),
            ist_ressort,
            ist_verfassungsorgan,
            description: wikidata.and_then(|wd| wd.description("de")).map(String::from),
            instance_of: wikidata.and_then(|wd| wd.instance_of()).map(String::from),
            inception: wikidata.and_then(|wd| wd.inception_year()),
            employees: wikidata.and_then(|wd| wd.employee_count()).map(|e| {
                match e.year {
                    Some(year) => format!("{} ({year})", format_de(e.count as f64, 0)),
                    None => format_de(e.count as f64, 0),
                }
            }),
            leader: wikidata.and_then(|wd| wd.current_leader()),
            parent: wikidata.and_then(|wd| wd.parent_organization()),
            subsidiaries: wikidata.map(|wd| wd.subsidiaries()).unwrap_or_default(),
            address,
            extra_locations,
            contact,
            website: website.or_else(|| {
                wikidata.and_then(|wd| wd.website()).map(String::from)
            }),
            wikipedia_url: wikidata.and_then(|wd| wd.wikipedia_url("de")),
            wikidata_url: wikidata.map(|wd| wd.wikidata_url()),
            image_url: wikidata.and_then(|wd| wd.image_url()),
            logo_url: wikidata.and_then(|wd| wd.logo_url()),
            social: wikidata.map(|wd| wd.social_media()).unwrap_or_default(),
            budget_amount,
            budget_source,
            budget_breakdown,
            record_error,
        });
    }
}

impl eframe::App for BundViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_load();
        if self.loading {
            ctx.request_repaint();
        }

        // ---- Top panel ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("BundView");
                ui.label("Behörden und Einrichtungen des Bundes");
                ui.separator();

                if ui.button("Datenordner öffnen...").clicked() {
                    if let Some(path) = rfd::FileDialog::new().pick_folder() {
                        self.start_load(path);
                    }
                }

                if self.loading {
                    ui.separator();
                    ui.spinner();
                    ui.label("Lade Datensätze...");
                }
            });

            if self.registry.is_some() && !self.loading {
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.view, View::Directory, "Behörden");
                    ui.selectable_value(&mut self.view, View::Budget, "Haushalt");
                    ui.separator();

                    if self.view == View::Directory {
                        ui.label("Suche:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.search_query)
                                .hint_text("Behörde, Ort, Ressort...")
                                .desired_width(240.0),
                        );

                        ui.selectable_value(&mut self.grouping, GroupBy::Ressort, "Nach Ressort");
                        ui.selectable_value(
                            &mut self.grouping,
                            GroupBy::Kategorie,
                            "Nach Kategorie",
                        );

                        ui.menu_button("Kategorien", |ui| {
                            for (kategorie, count) in &self.all_categories {
                                let mut active = self.active_categories.contains(kategorie);
                                if ui
                                    .checkbox(&mut active, format!("{kategorie} ({count})"))
                                    .changed()
                                {
                                    if active {
                                        self.active_categories.insert(kategorie.clone());
                                    } else {
                                        self.active_categories.remove(kategorie);
                                    }
                                }
                            }
                        });

                        if self.filters_active() && ui.button("Zurücksetzen").clicked() {
                            self.reset_filters();
                        }
                    }
                });
            }
        });

        // ---- Status bar ----
        if self.registry.is_some() && !self.loading {
            egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if let Some(registry) = &self.registry {
                        ui.label(format!("{} Behörden", registry.entries.len()));
                        if self.view == View::Budget && !self.treemap_cells.is_empty() {
                            ui.separator();
                            ui.label(format!(
                                "{} mit Haushaltsdaten | Gesamt: {}",
                                self.treemap_cells.len(),
                                format_budget(self.treemap_total)
                            ));
                        }
                        if let Some(idx) = self.hovered_cell {
                            if let Some(cell) = self.treemap_cells.get(idx) {
                                if let Some(entry) = registry.entries.get(cell.entry_idx) {
                                    let pct = if self.treemap_total > 0 {
                                        cell.amount as f64 / self.treemap_total as f64 * 100.0
                                    } else {
                                        0.0
                                    };
                                    ui.separator();
                                    ui.label(format!(
                                        "{} - {} ({:.1}%)",
                                        entry.organisation,
                                        format_budget(cell.amount),
                                        pct
                                    ));
                                }
                            }
                        }
                    }
                });
            });
        }

        // ---- Central panel ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.loading {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() / 3.0);
                    ui.heading("Lade Datensätze...");
                    ui.spinner();
                });
                return;
            }

            if self.registry.is_none() {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() / 3.0);
                    ui.heading("Willkommen bei BundView");
                    ui.add_space(10.0);
                    ui.label(
                        "Datenordner mit organizations-index.json, HH_2025.csv und \
                         wikidata.json auswählen.",
                    );
                    if let Some(err) = &self.load_error {
                        ui.add_space(10.0);
                        ui.colored_label(egui::Color32::LIGHT_RED, err);
                    }
                    ui.add_space(20.0);
                    if ui.button("Datenordner öffnen...").clicked() {
                        if let Some(path) = rfd::FileDialog::new().pick_folder() {
                            self.start_load(path);
                        }
                    }
                });
                return;
            }

            match self.view {
                View::Directory => self.directory_view(ui),
                View::Budget => self.budget_view(ui),
            }
        });

        self.detail_window(ctx);
    }
}

// Tile fills from the web original: amber for Ressort leads, light blue
// otherwise, dark text on both.
const TILE_LEAD_FILL: egui::Color32 = egui::Color32::from_rgb(253, 230, 138);
const TILE_FILL: egui::Color32 = egui::Color32::from_rgb(219, 234, 254);
const TILE_TEXT: egui::Color32 = egui::Color32::from_rgb(17, 24, 39);

impl BundViewApp {
    fn directory_view(&mut self, ui: &mut egui::Ui) {
        let Some(registry) = &self.registry else {
            return;
        };
        let visible = self.visible_entries(registry);

        if visible.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() / 3.0);
                ui.label("Keine Behörden gefunden.");
            });
            return;
        }

        ui.label(format!("{} Behörden", visible.len()));
        ui.add_space(4.0);

        let mut clicked: Option<IndexEntry> = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for group in group_entries(&visible, self.grouping) {
                ui.add_space(8.0);
                ui.separator();
                ui.strong(format!("{} ({})", group.label, group.entries.len()));
                ui.add_space(4.0);

                ui.horizontal_wrapped(|ui| {
                    for entry in &group.entries {
                        let fill = if entry.is_ressort_lead() {
                            TILE_LEAD_FILL
                        } else {
                            TILE_FILL
                        };
                        let text = egui::RichText::new(entry.tile_name())
                            .color(TILE_TEXT)
                            .size(12.0);
                        let response = ui
                            .add(egui::Button::new(text).fill(fill))
                            .on_hover_text(&entry.organisation);
                        if response.clicked() {
                            clicked = Some((*entry).clone());
                        }
                    }
                });
            }
            ui.add_space(12.0);
        });

        if let Some(entry) = clicked {
            self.open_detail(&entry);
        }
    }

    fn budget_view(&mut self, ui: &mut egui::Ui) {
        self.ensure_treemap();
        let Some(registry) = &self.registry else {
            return;
        };

        if self.treemap_cells.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() / 3.0);
                ui.label("Keine Haushaltsdaten verfügbar.");
            });
            return;
        }

        let rect = ui.available_rect_before_wrap();
        let painter = ui.painter_at(rect);
        let scale_x = rect.width() / CANVAS;
        let scale_y = rect.height() / CANVAS;

        let mouse_pos = ui.ctx().input(|i| i.pointer.hover_pos());
        let mut new_hovered: Option<usize> = None;
        let mut clicked: Option<IndexEntry> = None;
        let primary_clicked = ui.ctx().input(|i| i.pointer.primary_clicked());

        for (i, cell) in self.treemap_cells.iter().enumerate() {
            // The layout engine leaves gap-degenerate dimensions unclamped;
            // clamp here at the drawing boundary.
            let cell_rect = egui::Rect::from_min_size(
                egui::pos2(
                    rect.min.x + cell.rect.x * scale_x,
                    rect.min.y + cell.rect.y * scale_y,
                ),
                egui::vec2(
                    (cell.rect.width * scale_x).max(0.0),
                    (cell.rect.height * scale_y).max(0.0),
                ),
            );
            if cell_rect.width() < 1.0 || cell_rect.height() < 1.0 {
                continue;
            }

            let is_hovered = mouse_pos.is_some_and(|pos| cell_rect.contains(pos));
            if is_hovered {
                new_hovered = Some(i);
                if primary_clicked {
                    if let Some(entry) = registry.entries.get(cell.entry_idx) {
                        clicked = Some(entry.clone());
                    }
                }
            }

            painter.rect_filled(cell_rect, 1.0, cell_color(cell.color_index, is_hovered));

            let show_label =
                cell.rect.width > LABEL_MIN_W && cell.rect.height > LABEL_MIN_H;
            if show_label {
                if let Some(entry) = registry.entries.get(cell.entry_idx) {
                    let font_size = 12.0f32.min(cell_rect.height() * 0.25).max(9.0);
                    let max_chars = ((cell_rect.width() - 8.0) / (font_size * 0.55)) as usize;
                    let label = truncate_str(entry.cell_name(), max_chars);
                    if !label.is_empty() {
                        painter.text(
                            cell_rect.center() - egui::vec2(0.0, font_size * 0.7),
                            egui::Align2::CENTER_CENTER,
                            label,
                            egui::FontId::proportional(font_size),
                            egui::Color32::from_gray(20),
                        );
                        painter.text(
                            cell_rect.center() + egui::vec2(0.0, font_size * 0.7),
                            egui::Align2::CENTER_CENTER,
                            format_budget(cell.amount),
                            egui::FontId::proportional(font_size - 1.0),
                            egui::Color32::from_gray(60),
                        );
                    }
                }
            }
        }
        self.hovered_cell = new_hovered;

        ui.allocate_rect(rect, egui::Sense::click());

        if let Some(entry) = clicked {
            self.open_detail(&entry);
        }
    }

    fn detail_window(&mut self, ctx: &egui::Context) {
        let Some(detail) = &self.detail else {
            return;
        };

        let mut open = true;
        egui::Window::new(&detail.organisation)
            .open(&mut open)
            .collapsible(false)
            .vscroll(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                if let Some(kurz) = &detail.kurz {
                    ui.label(egui::RichText::new(kurz).weak());
                }

                ui.horizontal(|ui| {
                    if detail.ist_verfassungsorgan {
                        ui.label(
                            egui::RichText::new("Verfassungsorgan")
                                .small()
                                .strong()
                                .color(egui::Color32::DARK_GREEN),
                        );
                    } else if detail.ist_ressort {
                        ui.label(egui::RichText::new("Bundesministerium").small().strong());
                    }
                    if let Some(kategorie) = &detail.kategorie {
                        ui.label(egui::RichText::new(kategorie).small().strong());
                    }
                    if let Some(ressort) = &detail.ressort {
                        ui.label(egui::RichText::new(format!("Ressort: {ressort}")).small());
                    }
                });

                if let Some(description) = &detail.description {
                    ui.add_space(6.0);
                    ui.label(egui::RichText::new(description).italics());
                }

                if let Some(leader) = &detail.leader {
                    ui.add_space(6.0);
                    ui.strong("Leitung");
                    let mut line = leader.name.clone();
                    if let Some(party) = &leader.party {
                        line.push_str(&format!(" ({party})"));
                    }
                    if let Some(since) = &leader.since {
                        line.push_str(&format!(", seit {since}"));
                    }
                    ui.hyperlink_to(line, wikidata_item_url(&leader.qid));
                    let mut person = Vec::new();
                    if let Some(birth) = &leader.birth_date {
                        person.push(format!("geb. {birth}"));
                    }
                    if let Some(gender) = leader.gender {
                        person.push(format!("({gender})"));
                    }
                    if !person.is_empty() {
                        ui.label(egui::RichText::new(person.join(" ")).weak().small());
                    }
                    if let Some(description) = &leader.description {
                        ui.label(egui::RichText::new(description).weak());
                    }
                    if let Some(url) = &leader.image {
                        ui.hyperlink_to("Porträt", url);
                    }
                }

                if let Some(parent) = &detail.parent {
                    ui.add_space(6.0);
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new("Übergeordnet:").weak());
                        ui.hyperlink_to(&parent.name, wikidata_item_url(&parent.qid));
                    });
                }
                if !detail.subsidiaries.is_empty() {
                    ui.add_space(6.0);
                    ui.strong("Nachgeordnete Einrichtungen");
                    for sub in &detail.subsidiaries {
                        ui.hyperlink_to(&sub.name, wikidata_item_url(&sub.qid));
                    }
                }

                let mut facts: Vec<(&str, String)> = Vec::new();
                if let Some(instance_of) = &detail.instance_of {
                    facts.push(("Art", instance_of.clone()));
                }
                if let Some(inception) = &detail.inception {
                    facts.push(("Gegründet", inception.clone()));
                }
                if let Some(employees) = &detail.employees {
                    facts.push(("Beschäftigte", employees.clone()));
                }
                if !facts.is_empty() {
                    ui.add_space(6.0);
                    for (label, value) in facts {
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(format!("{label}:")).weak());
                            ui.label(value);
                        });
                    }
                }

                if !detail.address.is_empty() {
                    ui.add_space(6.0);
                    ui.strong("Anschrift");
                    for line in &detail.address {
                        ui.label(line);
                    }
                    if !detail.extra_locations.is_empty() {
                        ui.label(
                            egui::RichText::new(format!(
                                "{} weitere Standorte",
                                detail.extra_locations.len()
                            ))
                            .weak(),
                        );
                        for line in &detail.extra_locations {
                            ui.label(egui::RichText::new(line).small());
                        }
                    }
                }

                if !detail.contact.is_empty() {
                    ui.add_space(6.0);
                    ui.strong("Kontakt");
                    for (label, value) in &detail.contact {
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(format!("{label}:")).weak());
                            ui.label(value);
                        });
                    }
                }

                let has_links = detail.website.is_some()
                    || detail.wikipedia_url.is_some()
                    || detail.wikidata_url.is_some()
                    || detail.image_url.is_some()
                    || detail.logo_url.is_some();
                if has_links {
                    ui.add_space(6.0);
                    ui.strong("Links");
                    if let Some(url) = &detail.website {
                        ui.hyperlink_to("Website", url);
                    }
                    if let Some(url) = &detail.wikipedia_url {
                        ui.hyperlink_to("Wikipedia", url);
                    }
                    if let Some(url) = &detail.wikidata_url {
                        ui.hyperlink_to("Wikidata", url);
                    }
                    if let Some(url) = &detail.image_url {
                        ui.hyperlink_to("Bild", url);
                    }
                    if let Some(url) = &detail.logo_url {
                        ui.hyperlink_to("Logo", url);
                    }
                }

                if !detail.social.is_empty() {
                    ui.add_space(6.0);
                    ui.strong("Social Media");
                    for profile in &detail.social {
                        let label = match profile.followers {
                            Some(n) => {
                                format!("{} ({} Follower)", profile.platform, format_count(n))
                            }
                            None => profile.platform.to_string(),
                        };
                        ui.hyperlink_to(label, &profile.url);
                    }
                }

                if let Some(amount) = detail.budget_amount {
                    ui.add_space(6.0);
                    ui.strong("Haushalt 2025");
                    ui.label(
                        egui::RichText::new(format_budget(amount))
                            .size(18.0)
                            .strong(),
                    );
                    if let Some(source) = &detail.budget_source {
                        ui.label(egui::RichText::new(source).weak().small());
                    }
                    for line in &detail.budget_breakdown {
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(&line.label).small());
                            ui.label(egui::RichText::new(&line.description).small().weak());
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    ui.label(
                                        egui::RichText::new(format_budget(line.amount)).small(),
                                    );
                                },
                            );
                        });
                    }
                }

                if let Some(err) = &detail.record_error {
                    ui.add_space(6.0);
                    ui.colored_label(
                        egui::Color32::LIGHT_RED,
                        format!("Detaildatensatz nicht ladbar: {err}"),
                    );
                }
            });

        if !open {
            self.detail = None;
        }
    }
}

// ===================== Colors =====================

const PALETTE: [(u8, u8, u8); 8] = [
    (96, 165, 250),  // blue
    (52, 168, 83),   // green
    (251, 188, 4),   // yellow
    (234, 67, 53),   // red
    (171, 71, 188),  // purple
    (0, 172, 193),   // teal
    (255, 112, 67),  // orange
    (63, 81, 181),   // indigo
];

fn cell_color(ci: usize, hovered: bool) -> egui::Color32 {
    let (r, g, b) = PALETTE[ci % PALETTE.len()];
    if hovered {
        egui::Color32::from_rgb(
            r.saturating_add(35),
            g.saturating_add(35),
            b.saturating_add(35),
        )
    } else {
        egui::Color32::from_rgb(r, g, b)
    }
}

// ===================== Helpers =====================

fn wikidata_item_url(qid: &str) -> String {
    format!("https://www.wikidata.org/wiki/{qid}")
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    if max_chars < 4 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars - 3).collect();
        format!("{cut}...")
    }
}

/// German number formatting: dot-grouped thousands, comma decimals,
/// trailing zeros trimmed.
fn format_de(value: f64, max_decimals: usize) -> String {
    let formatted = format!("{value:.max_decimals$}");
    let (int_part, frac) = match formatted.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (formatted.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = format!("{sign}{grouped}");
    if let Some(frac) = frac {
        let trimmed = frac.trim_end_matches('0');
        if !trimmed.is_empty() {
            out.push(',');
            out.push_str(trimmed);
        }
    }
    out
}

/// Budget amounts arrive in thousand euros; display in billions.
fn format_budget(soll_thousand: i64) -> String {
    format!(
        "{} Mrd. €",
        format_de(soll_thousand as f64 / 1_000_000.0, 2)
    )
}

fn format_count(n: i64) -> String {
    if n >= 1_000_000 {
        format!("{}M", format_de(n as f64 / 1_000_000.0, 1))
    } else if n >= 1_000 {
        format!("{}K", format_de(n as f64 / 1_000.0, 1))
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_de_groups_thousands_with_dots() {
        assert_eq!(format_de(476_819.0, 0), "476.819");
        assert_eq!(format_de(1_000_000.0, 0), "1.000.000");
        assert_eq!(format_de(999.0, 0), "999");
        assert_eq!(format_de(-12_345.0, 0), "-12.345");
    }

    #[test]
    fn format_de_uses_comma_decimals_and_trims_zeros() {
        assert_eq!(format_de(476.819, 2), "476,82");
        assert_eq!(format_de(1.5, 2), "1,5");
        assert_eq!(format_de(2.0, 2), "2");
    }

    #[test]
    fn format_budget_converts_thousands_to_billions() {
        // 476,819,000 k€ is the 2025 federal total of roughly 476.8 bn €.
        assert_eq!(format_budget(476_819_000), "476,82 Mrd. €");
        assert_eq!(format_budget(1_500_000), "1,5 Mrd. €");
        assert_eq!(format_budget(500), "0 Mrd. €");
    }

    #[test]
    fn format_count_abbreviates_with_german_decimals() {
        assert_eq!(format_count(61_000), "61K");
        assert_eq!(format_count(61_500), "61,5K");
        assert_eq!(format_count(1_200_000), "1,2M");
        assert_eq!(format_count(870), "870");
    }

    #[test]
    fn truncate_str_respects_char_boundaries() {
        assert_eq!(truncate_str("Auswärtiges Amt", 30), "Auswärtiges Amt");
        assert_eq!(truncate_str("Bundesministerium", 10), "Bundesm...");
        assert_eq!(truncate_str("Behörde", 3), "");
    }
}
