use anyhow::Context;
use eframe::egui;
use llamachat_services::{AppConfig, AppModels, OllamaError, Services, SettingsService, UiPreferences};
use tracing::{info, warn};

use crate::panels::{chat::ChatPanel, download::DownloadWindow, settings::SettingsWindow};

pub struct LlamaChatApp {
    // Models and Services (owned directly)
    app_models: AppModels,
    services: Services,
    config: AppConfig,

    // Panels (views)
    chat: ChatPanel,
    settings: SettingsWindow,
    download: DownloadWindow,

    applied_ui: Option<UiPreferences>,
    /// Set when a refresh was requested while the list controller was busy
    pending_refresh: bool,
}

impl LlamaChatApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        let services = match Services::new(None) {
            Ok(services) => services,
            Err(e) => {
                warn!("Settings database unavailable, settings will not persist: {}", e);
                let settings = SettingsService::in_memory().context("in-memory settings store")?;
                Services::with_settings(settings).context("failed to start services")?
            }
        };

        let config = services.settings.load_config();
        info!(host = %config.connection.base_url(), default_model = %config.default_model, "Configuration loaded");

        let mut app = Self {
            app_models: AppModels::new(),
            services,
            config,
            chat: ChatPanel::default(),
            settings: SettingsWindow::default(),
            download: DownloadWindow::default(),
            applied_ui: None,
            pending_refresh: false,
        };

        app.apply_ui_preferences(&cc.egui_ctx);
        app.refresh_models();
        Ok(app)
    }

    fn refresh_models(&mut self) {
        match self
            .services
            .models
            .refresh(&mut self.app_models.models, &self.config.connection)
        {
            Ok(()) => {
                self.pending_refresh = false;
                self.app_models.chat.set_status("Loading models...");
            }
            Err(OllamaError::Busy) => self.pending_refresh = true,
            Err(e) => {
                warn!("Model refresh failed: {}", e);
                self.pending_refresh = false;
                self.report_model_status();
            }
        }
    }

    fn poll_services(&mut self) {
        let was_loading = self.app_models.models.loading;
        self.services
            .models
            .poll_models(&mut self.app_models.models, &self.config.default_model);
        if was_loading && !self.app_models.models.loading {
            self.report_model_status();
        }
        if self.pending_refresh && !self.services.models.is_busy() {
            self.refresh_models();
        }

        self.services.chat.poll(&mut self.app_models.chat);
        self.services.downloads.poll_download(&mut self.app_models.download);

        // A finished download should show up in the selector right away
        if let Some(name) = self.app_models.download.last_pulled.take() {
            info!(model = %name, "Refreshing models after download");
            self.refresh_models();
            self.services
                .downloads
                .refresh_installed(&mut self.app_models.download, &self.config.connection);
        }
    }

    fn report_model_status(&mut self) {
        let list = &self.app_models.models;
        let status = match (&list.error, list.has_models()) {
            (Some(_), _) => "Connection error".to_string(),
            (None, false) => "No models available".to_string(),
            (None, true) => format!("Ready - {} models available", list.models.len()),
        };
        self.app_models.chat.set_status(status);
    }

    fn apply_ui_preferences(&mut self, ctx: &egui::Context) {
        if self.applied_ui.as_ref() == Some(&self.config.ui) {
            return;
        }

        let ui = &self.config.ui;
        ctx.set_visuals(if ui.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        let base = ui.font_size as f32;
        ctx.style_mut(|style| {
            for (text_style, font) in style.text_styles.iter_mut() {
                font.size = match text_style {
                    egui::TextStyle::Heading => base * 1.5,
                    egui::TextStyle::Small => base * 0.8,
                    _ => base,
                };
            }
        });

        self.applied_ui = Some(ui.clone());
    }

    fn save_settings(&self) {
        if let Err(e) = self.services.settings.save_config(&self.config) {
            warn!("Failed to save settings: {}", e);
        }
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Model:");

            let list = &mut self.app_models.models;
            let selected_text = match (list.loading, list.has_models(), list.selected.is_empty()) {
                (true, _, _) => "Loading models...".to_string(),
                (_, false, _) => "No models found".to_string(),
                (_, _, true) => "Select model...".to_string(),
                _ => list.selected.clone(),
            };

            ui.add_enabled_ui(!list.loading, |ui| {
                egui::ComboBox::from_id_salt("model_select")
                    .selected_text(selected_text)
                    .width(220.0)
                    .show_ui(ui, |ui| {
                        let names = list.models.clone();
                        for name in names {
                            let label = if name == self.config.default_model {
                                format!("{name} (default)")
                            } else {
                                name.clone()
                            };
                            if ui.selectable_label(list.is_selected(&name), label).clicked() {
                                list.select(name);
                            }
                        }
                    });
            });

            if self.app_models.models.loading {
                ui.spinner();
            }

            if ui.button("Refresh").clicked() {
                self.refresh_models();
            }

            ui.separator();

            if ui.button("New Chat").clicked() {
                self.services.chat.clear(&mut self.app_models.chat);
                self.app_models.chat.set_status("New chat started");
            }
            if ui.button("Clear").clicked() {
                self.services.chat.clear(&mut self.app_models.chat);
            }

            ui.separator();
            self.render_default_model_menu(ui);

            if ui.button("Download Models").clicked() {
                self.download.open(&mut self.app_models.download, &mut self.services.downloads, &self.config.connection);
            }
            if ui.button("Settings").clicked() {
                self.settings.open(&self.config);
            }
        });
    }

    fn render_default_model_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Default Model", |ui| {
            let current = if self.config.default_model.is_empty() {
                "None".to_string()
            } else {
                self.config.default_model.clone()
            };
            ui.label(format!("Current: {current}"));
            ui.separator();

            let selected = self.app_models.models.selected.clone();
            if ui
                .add_enabled(!selected.is_empty(), egui::Button::new("Set Current as Default"))
                .clicked()
            {
                self.set_default_model(selected);
                ui.close_menu();
            }
            if ui
                .add_enabled(!self.config.default_model.is_empty(), egui::Button::new("Clear Default"))
                .clicked()
            {
                self.set_default_model(String::new());
                ui.close_menu();
            }
        });
    }

    fn set_default_model(&mut self, model: String) {
        if let Err(e) = self.services.settings.save_default_model(&model) {
            warn!("Failed to save default model: {}", e);
        }
        let status = if model.is_empty() {
            "Default model cleared".to_string()
        } else {
            format!("Default model set to {model}")
        };
        self.config.default_model = model;
        self.app_models.chat.set_status(status);
    }

    fn render_status_bar(&self, ui: &mut egui::Ui) {
        let list = &self.app_models.models;
        ui.horizontal(|ui| {
            ui.label(&self.app_models.chat.status);

            if let Some(error) = &list.error {
                ui.separator();
                ui.colored_label(egui::Color32::RED, error);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(format!("Models: {}/{}", list.models.len(), list.total))
                        .small()
                        .weak(),
                );
                ui.separator();
                ui.label(egui::RichText::new(self.config.connection.base_url()).small().weak());
            });
        });
    }
}

impl eframe::App for LlamaChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_services();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.render_toolbar(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.render_status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let model = self.app_models.models.selected.clone();
            self.chat.ui(
                ui,
                &mut self.app_models.chat,
                &mut self.services.chat,
                &model,
                &self.config,
            );
        });

        if let Some(config) = self.settings.show(ctx) {
            let reconnect = config.connection != self.config.connection;
            self.config = config;
            self.save_settings();
            self.apply_ui_preferences(ctx);
            self.app_models.chat.set_status("Settings saved");
            if reconnect {
                self.refresh_models();
            }
        }

        self.download.show(
            ctx,
            &mut self.app_models.download,
            &mut self.services.downloads,
            &self.config.connection,
        );

        if self.app_models.chat.streaming || self.app_models.download.is_busy() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.services.chat.cancel(&mut self.app_models.chat);
        self.services.downloads.cancel();
        self.save_settings();
        info!("LlamaChat shutting down");
    }
}
