use eframe::egui;
use llamachat_services::{
    AppConfig, ConnectionConfig, GenerationConfig, UiPreferences, FONT_SIZE_RANGE,
    TEMPERATURE_RANGE, TOP_P_RANGE,
};

/// Settings dialog. Edits a copy of the configuration; nothing changes until Save.
#[derive(Default)]
pub struct SettingsWindow {
    open: bool,
    connection: ConnectionConfig,
    generation: GenerationConfig,
    ui_prefs: UiPreferences,
    default_model: String,
    error: Option<String>,
}

impl SettingsWindow {
    pub fn open(&mut self, config: &AppConfig) {
        self.connection = config.connection.clone();
        self.generation = config.generation.clone();
        self.ui_prefs = config.ui.clone();
        self.default_model = config.default_model.clone();
        self.error = None;
        self.open = true;
    }

    /// Returns the replacement configuration when the user saves.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<AppConfig> {
        if !self.open {
            return None;
        }

        let mut open = true;
        let mut saved = None;
        let mut close = false;

        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .collapsible(false)
            .default_width(420.0)
            .show(ctx, |ui| {
                self.render_connection(ui);
                ui.add_space(8.0);
                ui.separator();
                self.render_generation(ui);
                ui.add_space(8.0);
                ui.separator();
                self.render_interface(ui);
                ui.add_space(8.0);

                if let Some(error) = &self.error {
                    ui.colored_label(egui::Color32::RED, error);
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        match self.build() {
                            Ok(config) => {
                                saved = Some(config);
                                close = true;
                            }
                            Err(e) => self.error = Some(e),
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        close = true;
                    }
                    if ui.button("Reset to Defaults").clicked() {
                        self.reset();
                    }
                });
            });

        self.open = open && !close;
        saved
    }

    fn render_connection(&mut self, ui: &mut egui::Ui) {
        ui.heading("Connection");
        egui::Grid::new("connection_grid")
            .num_columns(2)
            .spacing([10.0, 6.0])
            .show(ui, |ui| {
                ui.label("Host:");
                ui.text_edit_singleline(&mut self.connection.host);
                ui.end_row();

                ui.label("Port:");
                ui.add(egui::DragValue::new(&mut self.connection.port).range(1..=65535));
                ui.end_row();

                ui.label("Timeout (s):");
                ui.add(egui::DragValue::new(&mut self.connection.timeout_secs).range(1..=600));
                ui.end_row();
            });
    }

    fn render_generation(&mut self, ui: &mut egui::Ui) {
        ui.heading("Model");
        egui::Grid::new("generation_grid")
            .num_columns(2)
            .spacing([10.0, 6.0])
            .show(ui, |ui| {
                ui.label("Temperature:");
                ui.add(egui::Slider::new(&mut self.generation.temperature, TEMPERATURE_RANGE).step_by(0.05));
                ui.end_row();

                ui.label("Top P:");
                ui.add(egui::Slider::new(&mut self.generation.top_p, TOP_P_RANGE).step_by(0.05));
                ui.end_row();

                ui.label("Max tokens:");
                ui.add(egui::DragValue::new(&mut self.generation.max_output_tokens).range(1..=32768));
                ui.end_row();

                ui.label("Context window:");
                ui.add(egui::DragValue::new(&mut self.generation.context_window).range(256..=131072));
                ui.end_row();
            });

        ui.label("System prompt:");
        ui.add(
            egui::TextEdit::multiline(&mut self.generation.system_prompt)
                .desired_rows(3)
                .desired_width(f32::INFINITY)
                .hint_text("Optional instructions sent before every conversation"),
        );
    }

    fn render_interface(&mut self, ui: &mut egui::Ui) {
        ui.heading("Interface");
        ui.checkbox(&mut self.ui_prefs.dark_mode, "Dark mode");
        ui.checkbox(&mut self.ui_prefs.auto_scroll, "Auto-scroll to newest message");
        ui.checkbox(&mut self.ui_prefs.show_timestamps, "Show timestamps");
        ui.horizontal(|ui| {
            ui.label("Font size:");
            ui.add(egui::Slider::new(&mut self.ui_prefs.font_size, FONT_SIZE_RANGE));
        });
    }

    fn build(&self) -> Result<AppConfig, String> {
        let connection = ConnectionConfig::new(
            self.connection.host.clone(),
            self.connection.port,
            self.connection.timeout_secs,
        )
        .map_err(|e| e.to_string())?;

        let mut ui = self.ui_prefs.clone();
        ui.set_font_size(ui.font_size);

        Ok(AppConfig {
            connection,
            generation: self.generation.clone(),
            ui,
            default_model: self.default_model.clone(),
        })
    }

    fn reset(&mut self) {
        self.connection = ConnectionConfig::default();
        self.generation = GenerationConfig::default();
        self.ui_prefs = UiPreferences::default();
        self.error = None;
    }
}
